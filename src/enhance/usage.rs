//! Usage metrics for enhancement attempts.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::error::StoreError;
use crate::store::{SummaryStore, UsageRecord, UsageStatus};
use crate::summary::DayBoundary;

/// Aggregated usage for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageStats {
    pub requests: u64,
    pub tokens: u64,
    pub errors: u64,
    pub average_latency_ms: f64,
    /// Percentage of requests that succeeded, `0` when there were none.
    pub success_rate: f64,
}

impl UsageStats {
    pub fn from_totals(requests: u64, tokens: u64, errors: u64, total_latency_ms: u64) -> Self {
        if requests == 0 {
            return Self {
                requests: 0,
                tokens,
                errors,
                average_latency_ms: 0.0,
                success_rate: 0.0,
            };
        }

        let errors = errors.min(requests);
        Self {
            requests,
            tokens,
            errors,
            average_latency_ms: total_latency_ms as f64 / requests as f64,
            success_rate: (requests - errors) as f64 / requests as f64 * 100.0,
        }
    }

    pub fn from_records(records: &[UsageRecord]) -> Self {
        let errors = records
            .iter()
            .filter(|r| r.status == UsageStatus::Error)
            .count() as u64;
        Self::from_totals(
            records.len() as u64,
            records.iter().map(|r| r.tokens_used).sum(),
            errors,
            records.iter().map(|r| r.duration_ms).sum(),
        )
    }
}

/// Rough token count for generated text: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// Appends usage records and reads back daily aggregates.
#[derive(Clone)]
pub struct UsageRecorder {
    store: Arc<dyn SummaryStore>,
}

impl UsageRecorder {
    pub fn new(store: Arc<dyn SummaryStore>) -> Self {
        Self { store }
    }

    /// Append one record. A failed write is logged and dropped so it never
    /// fails the request that produced it.
    pub async fn record(&self, entry: UsageRecord) {
        if let Err(e) = self.store.record_usage(&entry).await {
            warn!(
                author = %entry.author_name,
                model = %entry.model,
                status = %entry.status,
                operation = "record_usage",
                "Failed to record usage: {}",
                e
            );
        }
    }

    /// Aggregate every record inside today's window.
    pub async fn today_stats(&self, boundary: DayBoundary) -> Result<UsageStats, StoreError> {
        let window = boundary.window(boundary.today());
        self.store.get_today_usage_stats(window).await
    }
}
