//! Claude Code CLI as a text generator.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::ProviderError;
use crate::summary::DayBucket;

use super::prompt::build_prompt;
use super::{GenerationConfig, TextGenerator};

/// Check if Claude Code CLI is installed and accessible.
///
/// Uses the `which` crate for cross-platform executable detection.
pub async fn check_claude_installed() -> Result<(), ProviderError> {
    let program = which::which("claude")
        .map_err(|_| ProviderError::Unavailable("Claude Code CLI not found in PATH".to_string()))?;

    let version_check = Command::new(&program)
        .arg("--version")
        .output()
        .await
        .map_err(|e| ProviderError::Unavailable(format!("Failed to run claude: {}", e)))?;

    if !version_check.status.success() {
        return Err(ProviderError::Unavailable(
            "claude --version exited with an error".to_string(),
        ));
    }

    Ok(())
}

/// Runs `claude -p <prompt> --output-format json --model <model>`.
///
/// The child is killed if the future is dropped, so an outer
/// `tokio::time::timeout` cancels the subprocess too.
#[derive(Debug, Clone)]
pub struct ClaudeCliGenerator {
    program: PathBuf,
}

impl ClaudeCliGenerator {
    pub fn new() -> Self {
        Self::with_program("claude")
    }

    /// Use a specific executable instead of `claude` from PATH.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ClaudeCliGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for ClaudeCliGenerator {
    async fn generate_summary(
        &self,
        bucket: &DayBucket,
        config: &GenerationConfig,
    ) -> Result<String, ProviderError> {
        let prompt = build_prompt(bucket);

        let output = Command::new(&self.program)
            .arg("-p")
            .arg(&prompt)
            .arg("--output-format")
            .arg("json")
            .arg("--model")
            .arg(&config.model)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ProviderError::Unavailable(format!(
                    "Failed to spawn {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let code = output.status.code().unwrap_or(-1);
            debug!(code, model = %config.model, "Claude CLI exited with an error");
            return Err(classify_failure(code, &stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_claude_response(&stdout)
    }
}

/// Claude CLI JSON envelope when using --output-format json
#[derive(serde::Deserialize)]
struct ClaudeCliResponse {
    result: String,
    #[serde(default)]
    is_error: bool,
}

/// Unwrap the CLI envelope. Output that is not an envelope is used as-is.
fn parse_claude_response(response: &str) -> Result<String, ProviderError> {
    match serde_json::from_str::<ClaudeCliResponse>(response) {
        Ok(envelope) if envelope.is_error => Err(ProviderError::Unavailable(envelope.result)),
        Ok(envelope) => Ok(envelope.result.trim().to_string()),
        Err(_) => Ok(response.trim().to_string()),
    }
}

fn classify_failure(code: i32, stderr: &str) -> ProviderError {
    let lowered = stderr.to_ascii_lowercase();
    if lowered.contains("rate limit") || lowered.contains("rate_limit") {
        return ProviderError::RateLimited {
            retry_after_secs: None,
        };
    }

    let first_line = stderr.lines().next().unwrap_or("").trim();
    ProviderError::Unavailable(format!("claude exited with code {}: {}", code, first_line))
}
