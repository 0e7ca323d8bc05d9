//! OpenAI-compatible chat-completions endpoint as a text generator.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::ProviderError;
use crate::summary::DayBucket;

use super::prompt::build_prompt;
use super::{GenerationConfig, TextGenerator};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Calls `POST {base}/chat/completions` with a single user message.
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate_summary(
        &self,
        bucket: &DayBucket,
        config: &GenerationConfig,
    ) -> Result<String, ProviderError> {
        let body = serde_json::json!({
            "model": config.model,
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
            "messages": [
                { "role": "user", "content": build_prompt(bucket) }
            ],
        });

        let mut request = self
            .client
            .post(self.endpoint())
            .timeout(config.timeout)
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(config.timeout.as_millis() as u64)
            } else {
                ProviderError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Err(ProviderError::RateLimited { retry_after_secs });
        }
        if status.is_server_error() {
            return Err(ProviderError::Unavailable(format!(
                "{} returned {}",
                self.base_url, status
            )));
        }
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let snippet: String = body_text.chars().take(200).collect();
            return Err(ProviderError::InvalidResponse(format!(
                "HTTP {}: {}",
                status, snippet
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(config.timeout.as_millis() as u64)
            } else {
                ProviderError::InvalidResponse(format!("Malformed body: {}", e))
            }
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ProviderError::InvalidResponse("Missing choices[0].message.content".to_string())
            })?;

        debug!(model = %config.model, chars = content.len(), "Chat completion received");
        Ok(content.trim().to_string())
    }
}
