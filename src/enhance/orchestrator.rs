//! Per-day enhancement: reuse a valid cache entry or call the provider once.

use std::sync::Arc;

use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use crate::error::{ProviderError, StoreError};
use crate::llm::{GenerationConfig, TextGenerator};
use crate::store::{
    timestamp_now, CachedEnhancement, NewCachedEnhancement, SummaryStore, UsageRecord, UsageStatus,
};
use crate::summary::{evaluate, CacheDecision, DayBucket};

use super::usage::{estimate_tokens, UsageRecorder};

/// Generation settings plus the optional second model.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancementSettings {
    pub generation: GenerationConfig,
    /// Tried once after the primary model fails. `None` means a single attempt.
    pub fallback_model: Option<String>,
}

impl EnhancementSettings {
    fn models(&self) -> Vec<&str> {
        let mut models = vec![self.generation.model.as_str()];
        if let Some(fallback) = self.fallback_model.as_deref() {
            if !fallback.trim().is_empty() && fallback != self.generation.model {
                models.push(fallback);
            }
        }
        models
    }
}

/// Terminal state of one day's enhancement.
#[derive(Debug, Clone, PartialEq)]
pub enum EnhancementOutcome {
    /// Stored enhancement matched the day's commits. No provider call.
    Cached(CachedEnhancement),
    /// Fresh text from the provider, already persisted.
    Generated(CachedEnhancement),
    /// Every attempt failed. The day keeps only its basic summary.
    Fallback { reason: String },
}

impl EnhancementOutcome {
    pub fn enhancement(&self) -> Option<&CachedEnhancement> {
        match self {
            EnhancementOutcome::Cached(entry) | EnhancementOutcome::Generated(entry) => Some(entry),
            EnhancementOutcome::Fallback { .. } => None,
        }
    }
}

/// Drives cache lookup, eviction and generation for one bucket at a time.
pub struct EnhancementOrchestrator {
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn SummaryStore>,
    usage: UsageRecorder,
    settings: EnhancementSettings,
}

impl EnhancementOrchestrator {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn SummaryStore>,
        settings: EnhancementSettings,
    ) -> Self {
        let usage = UsageRecorder::new(store.clone());
        Self {
            generator,
            store,
            usage,
            settings,
        }
    }

    pub fn settings(&self) -> &EnhancementSettings {
        &self.settings
    }

    /// Resolve the enhancement for `bucket`.
    ///
    /// With `force` any existing entry is deleted and the cache is not
    /// consulted. Store failures are returned; provider failures become
    /// [`EnhancementOutcome::Fallback`].
    pub async fn enhance(
        &self,
        author: &str,
        bucket: &DayBucket,
        force: bool,
    ) -> Result<EnhancementOutcome, StoreError> {
        let date = bucket.date;
        let current = bucket.hashes();

        if force {
            self.store.delete_cached_enhancement(author, date).await?;
        } else {
            let existing = self.store.get_cached_enhancement(author, date).await?;
            let decision = evaluate(&current, existing.as_ref());
            debug!(author = %author, date = %date, decision = decision.as_str(), "Cache check");

            match (decision, existing) {
                (CacheDecision::Hit, Some(entry)) => return Ok(EnhancementOutcome::Cached(entry)),
                (CacheDecision::Stale, _) => {
                    self.store.delete_cached_enhancement(author, date).await?;
                }
                _ => {}
            }
        }

        let mut last_error = None;
        for model in self.settings.models() {
            let config = self.settings.generation.with_model(model);
            match self.attempt(author, bucket, &config).await {
                Ok(text) => {
                    let entry = self
                        .store
                        .save_cached_enhancement(&NewCachedEnhancement {
                            author_name: author.to_string(),
                            date,
                            commit_hashes: current,
                            enhanced_text: text,
                            model: model.to_string(),
                        })
                        .await?;
                    return Ok(EnhancementOutcome::Generated(entry));
                }
                Err(e) => {
                    warn!(
                        author = %author,
                        date = %date,
                        model = %model,
                        operation = "generate_summary",
                        "Enhancement failed, keeping basic summary: {}",
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Ok(EnhancementOutcome::Fallback {
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "No model configured".to_string()),
        })
    }

    /// One bounded provider call. Records exactly one usage entry.
    async fn attempt(
        &self,
        author: &str,
        bucket: &DayBucket,
        config: &GenerationConfig,
    ) -> Result<String, ProviderError> {
        let started = Instant::now();
        let result = match timeout(
            config.timeout,
            self.generator.generate_summary(bucket, config),
        )
        .await
        {
            Err(_) => Err(ProviderError::Timeout(config.timeout.as_millis() as u64)),
            Ok(Err(e)) => Err(e),
            Ok(Ok(text)) if text.trim().is_empty() => Err(ProviderError::InvalidResponse(
                "empty response".to_string(),
            )),
            Ok(Ok(text)) => Ok(text.trim().to_string()),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let (status, tokens_used, error_message) = match &result {
            Ok(text) => (UsageStatus::Success, estimate_tokens(text), None),
            Err(e) => (UsageStatus::Error, 0, Some(e.to_string())),
        };
        self.usage
            .record(UsageRecord {
                timestamp: timestamp_now(),
                model: config.model.clone(),
                tokens_used,
                duration_ms,
                status,
                error_message,
                author_name: author.to_string(),
            })
            .await;

        result
    }
}
