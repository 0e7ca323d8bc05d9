//! In-memory [`SummaryStore`] implementation for tests and embedding.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`. Locks are held only
//! for the duration of a single map operation.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::summary::StoredHashes;

use super::{
    timestamp_now, CachedEnhancement, DailySummaryRecord, EnhancementRef, NewCachedEnhancement,
    NewDailySummary, SummaryStore, UsageRecord,
};

type EnhancementKey = (String, NaiveDate);
type SummaryKey = (String, NaiveDate, String);

#[derive(Clone)]
struct StoredSummary {
    id: String,
    basic_text: String,
    enhancement_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// In-memory store with the same upsert and link semantics as [`SqliteStore`](super::SqliteStore).
pub struct MemoryStore {
    enhancements: RwLock<HashMap<EnhancementKey, CachedEnhancement>>,
    summaries: RwLock<HashMap<SummaryKey, StoredSummary>>,
    usage: RwLock<Vec<UsageRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            enhancements: RwLock::new(HashMap::new()),
            summaries: RwLock::new(HashMap::new()),
            usage: RwLock::new(Vec::new()),
        }
    }

    /// Overwrite the stored hashes of an entry. Lets tests simulate a damaged row.
    pub fn set_commit_hashes(
        &self,
        author: &str,
        date: NaiveDate,
        hashes: StoredHashes,
    ) -> Result<bool, StoreError> {
        let mut map = self
            .enhancements
            .write()
            .map_err(|_| StoreError::Poisoned("set_commit_hashes"))?;
        Ok(match map.get_mut(&(author.to_string(), date)) {
            Some(entry) => {
                entry.commit_hashes = hashes;
                true
            }
            None => false,
        })
    }

    fn resolve_link(&self, enhancement_id: Option<&str>) -> Result<Option<EnhancementRef>, StoreError> {
        let Some(id) = enhancement_id else {
            return Ok(None);
        };
        let map = self
            .enhancements
            .read()
            .map_err(|_| StoreError::Poisoned("resolve_link"))?;
        Ok(map.values().find(|e| e.id == id).map(EnhancementRef::from))
    }

    fn to_record(&self, key: &SummaryKey, stored: &StoredSummary) -> Result<DailySummaryRecord, StoreError> {
        Ok(DailySummaryRecord {
            id: stored.id.clone(),
            author_name: key.0.clone(),
            date: key.1,
            basic_text: stored.basic_text.clone(),
            repository: key.2.clone(),
            enhancement: self.resolve_link(stored.enhancement_id.as_deref())?,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SummaryStore for MemoryStore {
    async fn get_daily_summaries(
        &self,
        author: &str,
        since: NaiveDate,
        repository: &str,
    ) -> Result<Vec<DailySummaryRecord>, StoreError> {
        let matching: Vec<(SummaryKey, StoredSummary)> = {
            let map = self
                .summaries
                .read()
                .map_err(|_| StoreError::Poisoned("get_daily_summaries"))?;
            map.iter()
                .filter(|((a, d, r), _)| a == author && *d >= since && r == repository)
                .map(|(key, s)| (key.clone(), s.clone()))
                .collect()
        };

        let mut records = matching
            .iter()
            .map(|(key, stored)| self.to_record(key, stored))
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by_key(|r| r.date);
        Ok(records)
    }

    async fn save_daily_summary<'a>(
        &self,
        summary: &NewDailySummary,
        enhancement_id: Option<&'a str>,
    ) -> Result<DailySummaryRecord, StoreError> {
        let key = (
            summary.author_name.clone(),
            summary.date,
            summary.repository.clone(),
        );
        let now = timestamp_now();

        let snapshot = {
            let mut map = self
                .summaries
                .write()
                .map_err(|_| StoreError::Poisoned("save_daily_summary"))?;
            let stored = map.entry(key.clone()).or_insert_with(|| StoredSummary {
                id: Uuid::new_v4().to_string(),
                basic_text: summary.basic_text.clone(),
                enhancement_id: enhancement_id.map(str::to_string),
                created_at: now,
                updated_at: now,
            });

            if stored.basic_text != summary.basic_text
                || stored.enhancement_id.as_deref() != enhancement_id
            {
                stored.basic_text = summary.basic_text.clone();
                stored.enhancement_id = enhancement_id.map(str::to_string);
                stored.updated_at = now;
            }

            stored.clone()
        };

        self.to_record(&key, &snapshot)
    }

    async fn get_cached_enhancement(
        &self,
        author: &str,
        date: NaiveDate,
    ) -> Result<Option<CachedEnhancement>, StoreError> {
        let map = self
            .enhancements
            .read()
            .map_err(|_| StoreError::Poisoned("get_cached_enhancement"))?;
        Ok(map.get(&(author.to_string(), date)).cloned())
    }

    async fn save_cached_enhancement(
        &self,
        entry: &NewCachedEnhancement,
    ) -> Result<CachedEnhancement, StoreError> {
        let now = timestamp_now();
        let mut map = self
            .enhancements
            .write()
            .map_err(|_| StoreError::Poisoned("save_cached_enhancement"))?;

        let stored = map
            .entry((entry.author_name.clone(), entry.date))
            .and_modify(|existing| {
                existing.commit_hashes = entry.commit_hashes.clone().into();
                existing.enhanced_text = entry.enhanced_text.clone();
                existing.model = entry.model.clone();
                existing.updated_at = now;
            })
            .or_insert_with(|| CachedEnhancement {
                id: Uuid::new_v4().to_string(),
                author_name: entry.author_name.clone(),
                date: entry.date,
                commit_hashes: entry.commit_hashes.clone().into(),
                enhanced_text: entry.enhanced_text.clone(),
                model: entry.model.clone(),
                created_at: now,
                updated_at: now,
            });

        Ok(stored.clone())
    }

    async fn delete_cached_enhancement(
        &self,
        author: &str,
        date: NaiveDate,
    ) -> Result<bool, StoreError> {
        let mut map = self
            .enhancements
            .write()
            .map_err(|_| StoreError::Poisoned("delete_cached_enhancement"))?;
        Ok(map.remove(&(author.to_string(), date)).is_some())
    }

    async fn delete_cached_enhancements(
        &self,
        author: &str,
        since: NaiveDate,
    ) -> Result<u64, StoreError> {
        let mut map = self
            .enhancements
            .write()
            .map_err(|_| StoreError::Poisoned("delete_cached_enhancements"))?;
        let before = map.len();
        map.retain(|(a, d), _| !(a == author && *d >= since));
        Ok((before - map.len()) as u64)
    }

    async fn record_usage(&self, entry: &UsageRecord) -> Result<(), StoreError> {
        self.usage
            .write()
            .map_err(|_| StoreError::Poisoned("record_usage"))?
            .push(entry.clone());
        Ok(())
    }

    async fn list_usage(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UsageRecord>, StoreError> {
        let usage = self
            .usage
            .read()
            .map_err(|_| StoreError::Poisoned("list_usage"))?;
        let mut records: Vec<UsageRecord> = usage
            .iter()
            .filter(|r| r.timestamp >= start && r.timestamp < end)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }
}
