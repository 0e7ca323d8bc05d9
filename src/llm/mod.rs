//! Text-generation providers and prompt construction.

pub mod claude;
pub mod http;
pub mod prompt;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::summary::DayBucket;

pub use claude::{check_claude_installed, ClaudeCliGenerator};
pub use http::OpenAiGenerator;
pub use prompt::{build_prompt, sanitize_for_prompt};

/// Settings for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Upper bound on a single call, enforced by the caller.
    pub timeout: Duration,
}

impl GenerationConfig {
    /// Same settings with a different model.
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }
}

/// Turns one day's commits into prose.
///
/// An empty string is a valid return value; callers decide what it means.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_summary(
        &self,
        bucket: &DayBucket,
        config: &GenerationConfig,
    ) -> Result<String, ProviderError>;
}

/// Supported generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    Claude,
    OpenAi,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Claude => "claude",
            Provider::OpenAi => "openai",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claude" => Ok(Provider::Claude),
            "openai" => Ok(Provider::OpenAi),
            other => Err(format!("Unknown provider '{}'. Use claude or openai", other)),
        }
    }
}
