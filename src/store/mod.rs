//! Persistence gateway for daily summaries, cached enhancements, and usage.
//!
//! The [`SummaryStore`] trait lists every storage operation the pipeline
//! needs. Two backends ship with the crate:
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`SqliteStore`] | Durable storage for the CLI |
//! | [`MemoryStore`] | Tests and embedding without a database |
//!
//! Implementations own their consistency: both upserts below must be atomic
//! with respect to their unique keys.

pub mod memory;
pub mod records;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::enhance::usage::UsageStats;
use crate::error::StoreError;
use crate::summary::DayWindow;

pub use memory::MemoryStore;
pub use records::{
    CachedEnhancement, DailySummaryRecord, EnhancementRef, NewCachedEnhancement, NewDailySummary,
    UsageRecord, UsageStatus,
};
pub use sqlite::SqliteStore;

/// Current time at the millisecond precision every backend persists.
///
/// Use this for any timestamp that is later compared with stored values.
pub fn timestamp_now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Summaries for `author` in `repository` dated on or after `since`, oldest first.
    async fn get_daily_summaries(
        &self,
        author: &str,
        since: NaiveDate,
        repository: &str,
    ) -> Result<Vec<DailySummaryRecord>, StoreError>;

    /// Upsert by (author, date, repository). `updated_at` only moves when the
    /// text or the enhancement link changes.
    async fn save_daily_summary<'a>(
        &self,
        summary: &NewDailySummary,
        enhancement_id: Option<&'a str>,
    ) -> Result<DailySummaryRecord, StoreError>;

    async fn get_cached_enhancement(
        &self,
        author: &str,
        date: NaiveDate,
    ) -> Result<Option<CachedEnhancement>, StoreError>;

    /// Upsert by (author, date). An existing entry keeps its id and `created_at`.
    async fn save_cached_enhancement(
        &self,
        entry: &NewCachedEnhancement,
    ) -> Result<CachedEnhancement, StoreError>;

    /// Evict one day's enhancement. Returns whether anything was removed.
    async fn delete_cached_enhancement(
        &self,
        author: &str,
        date: NaiveDate,
    ) -> Result<bool, StoreError>;

    /// Evict every enhancement for `author` dated on or after `since`.
    async fn delete_cached_enhancements(
        &self,
        author: &str,
        since: NaiveDate,
    ) -> Result<u64, StoreError>;

    async fn record_usage(&self, entry: &UsageRecord) -> Result<(), StoreError>;

    /// Usage records with `start <= timestamp < end`, oldest first.
    async fn list_usage(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UsageRecord>, StoreError>;

    /// Aggregate usage for one calendar day.
    async fn get_today_usage_stats(&self, today: DayWindow) -> Result<UsageStats, StoreError> {
        let records = self.list_usage(today.start, today.end).await?;
        Ok(UsageStats::from_records(&records))
    }
}
