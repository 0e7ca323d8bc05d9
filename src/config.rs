//! Environment-driven settings.
//!
//! Every value has a default. An invalid value logs a warning and keeps the
//! default instead of failing the run.

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::enhance::EnhancementSettings;
use crate::llm::http::DEFAULT_API_BASE;
use crate::llm::{GenerationConfig, Provider};
use crate::summary::DayBoundary;

pub const DB_ENV_VAR: &str = "DAYBOOK_DB";
pub const PROVIDER_ENV_VAR: &str = "DAYBOOK_PROVIDER";
pub const MODEL_ENV_VAR: &str = "DAYBOOK_MODEL";
pub const FALLBACK_MODEL_ENV_VAR: &str = "DAYBOOK_FALLBACK_MODEL";
pub const MAX_TOKENS_ENV_VAR: &str = "DAYBOOK_MAX_TOKENS";
pub const TEMPERATURE_ENV_VAR: &str = "DAYBOOK_TEMPERATURE";
pub const TIMEOUT_ENV_VAR: &str = "DAYBOOK_TIMEOUT";
pub const TIMEZONE_ENV_VAR: &str = "DAYBOOK_TIMEZONE";
pub const API_BASE_ENV_VAR: &str = "DAYBOOK_API_BASE";
pub const API_KEY_ENV_VAR: &str = "DAYBOOK_API_KEY";
pub const OPENAI_KEY_ENV_VAR: &str = "OPENAI_API_KEY";

pub const DEFAULT_DB_PATH: &str = ".daybook/daybook.db";
pub const DEFAULT_MODEL: &str = "sonnet";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Resolved runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub db_path: PathBuf,
    pub provider: Provider,
    pub model: String,
    pub fallback_model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
    pub boundary: DayBoundary,
    pub api_base: String,
    pub api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            provider: Provider::default(),
            model: DEFAULT_MODEL.to_string(),
            fallback_model: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            boundary: DayBoundary::default(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
        }
    }
}

impl Settings {
    /// Read settings from `DAYBOOK_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Settings::default();

        let temperature = parse_var(TEMPERATURE_ENV_VAR, defaults.temperature);
        let temperature = if (0.0..=2.0).contains(&temperature) {
            temperature
        } else {
            warn!(
                "{} value {} is outside 0.0-2.0, using default {}",
                TEMPERATURE_ENV_VAR, temperature, defaults.temperature
            );
            defaults.temperature
        };

        Self {
            db_path: string_var(DB_ENV_VAR)
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            provider: parse_var(PROVIDER_ENV_VAR, defaults.provider),
            model: string_var(MODEL_ENV_VAR).unwrap_or(defaults.model),
            fallback_model: string_var(FALLBACK_MODEL_ENV_VAR),
            max_tokens: parse_var(MAX_TOKENS_ENV_VAR, defaults.max_tokens),
            temperature,
            timeout: Duration::from_secs(parse_var(TIMEOUT_ENV_VAR, DEFAULT_TIMEOUT_SECS)),
            boundary: parse_var(TIMEZONE_ENV_VAR, defaults.boundary),
            api_base: string_var(API_BASE_ENV_VAR).unwrap_or(defaults.api_base),
            api_key: string_var(API_KEY_ENV_VAR).or_else(|| string_var(OPENAI_KEY_ENV_VAR)),
        }
    }

    pub fn generation(&self) -> GenerationConfig {
        GenerationConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
        }
    }

    pub fn enhancement(&self) -> EnhancementSettings {
        EnhancementSettings {
            generation: self.generation(),
            fallback_model: self.fallback_model.clone(),
        }
    }
}

/// Non-empty, trimmed value of an environment variable.
fn string_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match string_var(name) {
        Some(v) => match v.parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("Invalid {} value '{}', using default {}", name, v, default);
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use chrono::FixedOffset;
    use serial_test::serial;

    use super::*;

    const ALL_VARS: [&str; 11] = [
        DB_ENV_VAR,
        PROVIDER_ENV_VAR,
        MODEL_ENV_VAR,
        FALLBACK_MODEL_ENV_VAR,
        MAX_TOKENS_ENV_VAR,
        TEMPERATURE_ENV_VAR,
        TIMEOUT_ENV_VAR,
        TIMEZONE_ENV_VAR,
        API_BASE_ENV_VAR,
        API_KEY_ENV_VAR,
        OPENAI_KEY_ENV_VAR,
    ];

    #[test]
    #[serial]
    fn test_defaults_when_unset() {
        temp_env::with_vars_unset(ALL_VARS, || {
            assert_eq!(Settings::from_env(), Settings::default());
        });
    }

    #[test]
    #[serial]
    fn test_values_from_env() {
        temp_env::with_vars_unset(ALL_VARS, || {
            temp_env::with_vars(
                [
                    (PROVIDER_ENV_VAR, Some("openai")),
                    (MODEL_ENV_VAR, Some("gpt-4o-mini")),
                    (FALLBACK_MODEL_ENV_VAR, Some("gpt-4o")),
                    (MAX_TOKENS_ENV_VAR, Some("300")),
                    (TEMPERATURE_ENV_VAR, Some("0.7")),
                    (TIMEOUT_ENV_VAR, Some("30")),
                    (TIMEZONE_ENV_VAR, Some("+02:00")),
                    (OPENAI_KEY_ENV_VAR, Some("sk-test")),
                ],
                || {
                    let settings = Settings::from_env();
                    assert_eq!(settings.provider, Provider::OpenAi);
                    assert_eq!(settings.model, "gpt-4o-mini");
                    assert_eq!(settings.fallback_model.as_deref(), Some("gpt-4o"));
                    assert_eq!(settings.max_tokens, 300);
                    assert_eq!(settings.temperature, 0.7);
                    assert_eq!(settings.timeout, Duration::from_secs(30));
                    assert_eq!(
                        settings.boundary,
                        DayBoundary::Fixed(FixedOffset::east_opt(2 * 3600).unwrap())
                    );
                    assert_eq!(settings.api_key.as_deref(), Some("sk-test"));
                },
            );
        });
    }

    #[test]
    #[serial]
    fn test_invalid_values_keep_defaults() {
        temp_env::with_vars_unset(ALL_VARS, || {
            temp_env::with_vars(
                [
                    (PROVIDER_ENV_VAR, Some("codex")),
                    (MAX_TOKENS_ENV_VAR, Some("lots")),
                    (TEMPERATURE_ENV_VAR, Some("3.5")),
                    (TIMEOUT_ENV_VAR, Some("-1")),
                    (TIMEZONE_ENV_VAR, Some("mars")),
                ],
                || {
                    assert_eq!(Settings::from_env(), Settings::default());
                },
            );
        });
    }

    #[test]
    #[serial]
    fn test_daybook_key_wins_over_openai_key() {
        temp_env::with_vars(
            [
                (API_KEY_ENV_VAR, Some("daybook-key")),
                (OPENAI_KEY_ENV_VAR, Some("openai-key")),
            ],
            || {
                assert_eq!(Settings::from_env().api_key.as_deref(), Some("daybook-key"));
            },
        );
    }

    #[test]
    #[serial]
    fn test_empty_values_are_unset() {
        temp_env::with_vars_unset(ALL_VARS, || {
            temp_env::with_vars(
                [(MODEL_ENV_VAR, Some("  ")), (FALLBACK_MODEL_ENV_VAR, Some(""))],
                || {
                    let settings = Settings::from_env();
                    assert_eq!(settings.model, DEFAULT_MODEL);
                    assert_eq!(settings.fallback_model, None);
                },
            );
        });
    }
}
