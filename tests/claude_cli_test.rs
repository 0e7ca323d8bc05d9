//! Integration tests for the Claude CLI generator.
//!
//! Each test writes a shell script that stands in for the `claude` binary
//! and points `ClaudeCliGenerator` at it.
#![cfg(unix)]

mod common;

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::timeout;

use common::{commit, jan, one_day};
use daybook::error::ProviderError;
use daybook::llm::{ClaudeCliGenerator, GenerationConfig, TextGenerator};
use daybook::summary::{DayBoundary, DayBucket};

fn create_mock_script(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let script_path = temp_dir.path().join("claude");
    fs::write(&script_path, content).expect("Failed to write script");

    // Make executable
    let mut perms = fs::metadata(&script_path)
        .expect("Failed to get metadata")
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&script_path, perms).expect("Failed to set permissions");

    (temp_dir, script_path)
}

fn config() -> GenerationConfig {
    GenerationConfig {
        model: "haiku".to_string(),
        max_tokens: 256,
        temperature: 0.3,
        timeout: Duration::from_secs(5),
    }
}

fn login_day() -> DayBucket {
    one_day(vec![commit("a1", jan(10, 10), "feat: add login")], DayBoundary::Utc)
}

async fn run(script: &str) -> Result<String, ProviderError> {
    let (_dir, path) = create_mock_script(script);
    let generator = ClaudeCliGenerator::with_program(path);
    generator.generate_summary(&login_day(), &config()).await
}

// ============================================
// Successful output
// ============================================

const MOCK_ENVELOPE: &str = r#"#!/bin/sh
echo '{"type":"result","subtype":"success","is_error":false,"result":"Added the login flow."}'
"#;

#[tokio::test]
async fn test_envelope_result_is_returned() {
    assert_eq!(run(MOCK_ENVELOPE).await.unwrap(), "Added the login flow.");
}

/// Echoes its arguments so the test can check the command line.
const MOCK_ARGS: &str = r#"#!/bin/sh
prompt=""
model=""
format=""
while [ $# -gt 0 ]; do
    case "$1" in
        -p) prompt="$2"; shift 2 ;;
        --model) model="$2"; shift 2 ;;
        --output-format) format="$2"; shift 2 ;;
        *) shift ;;
    esac
done
case "$prompt" in
    *"feat: add login"*) has_commit=yes ;;
    *) has_commit=no ;;
esac
echo "model=$model format=$format commit=$has_commit"
"#;

#[tokio::test]
async fn test_command_line_carries_prompt_and_model() {
    assert_eq!(
        run(MOCK_ARGS).await.unwrap(),
        "model=haiku format=json commit=yes"
    );
}

const MOCK_EMPTY: &str = r#"#!/bin/sh
echo '{"type":"result","is_error":false,"result":""}'
"#;

#[tokio::test]
async fn test_empty_result_is_returned_as_empty() {
    assert_eq!(run(MOCK_EMPTY).await.unwrap(), "");
}

// ============================================
// Failures
// ============================================

const MOCK_IS_ERROR: &str = r#"#!/bin/sh
echo '{"type":"result","is_error":true,"result":"Invalid API key"}'
"#;

#[tokio::test]
async fn test_is_error_envelope_is_unavailable() {
    assert_eq!(
        run(MOCK_IS_ERROR).await,
        Err(ProviderError::Unavailable("Invalid API key".to_string()))
    );
}

const MOCK_RATE_LIMIT: &str = r#"#!/bin/sh
echo 'Error: rate limit exceeded, try later' >&2
exit 1
"#;

#[tokio::test]
async fn test_rate_limit_exit_is_rate_limited() {
    assert_eq!(
        run(MOCK_RATE_LIMIT).await,
        Err(ProviderError::RateLimited {
            retry_after_secs: None
        })
    );
}

const MOCK_CRASH: &str = r#"#!/bin/sh
echo 'segfault' >&2
exit 3
"#;

#[tokio::test]
async fn test_other_exit_is_unavailable_with_code() {
    let err = run(MOCK_CRASH).await.unwrap_err();
    match err {
        ProviderError::Unavailable(message) => {
            assert!(message.contains("code 3"), "got: {}", message);
            assert!(message.contains("segfault"), "got: {}", message);
        }
        other => panic!("Expected Unavailable, got {:?}", other),
    }
}

/// Mock that sleeps forever (will be killed by timeout).
const MOCK_TIMEOUT: &str = r#"#!/bin/sh
sleep 3600
"#;

#[tokio::test]
async fn test_outer_timeout_cancels_subprocess() {
    let (_dir, path) = create_mock_script(MOCK_TIMEOUT);
    let generator = ClaudeCliGenerator::with_program(path);
    let bucket = login_day();
    let config = config();

    let started = std::time::Instant::now();
    let result = timeout(
        Duration::from_millis(200),
        generator.generate_summary(&bucket, &config),
    )
    .await;

    assert!(result.is_err(), "Expected timeout");
    assert!(started.elapsed() < Duration::from_secs(5));
}
