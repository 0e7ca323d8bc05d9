//! Persisted record types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::summary::cache::{CommitHashSet, StoredHashes};

/// A provider-generated summary cached for one author and day.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEnhancement {
    pub id: String,
    pub author_name: String,
    pub date: NaiveDate,
    pub commit_hashes: StoredHashes,
    pub enhanced_text: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`save_cached_enhancement`](super::SummaryStore::save_cached_enhancement).
#[derive(Debug, Clone, PartialEq)]
pub struct NewCachedEnhancement {
    pub author_name: String,
    pub date: NaiveDate,
    pub commit_hashes: CommitHashSet,
    pub enhanced_text: String,
    pub model: String,
}

/// Link from a daily summary to the enhancement it was saved with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementRef {
    pub id: String,
    pub model: String,
    pub text: String,
    pub updated_at: DateTime<Utc>,
}

impl From<&CachedEnhancement> for EnhancementRef {
    fn from(entry: &CachedEnhancement) -> Self {
        Self {
            id: entry.id.clone(),
            model: entry.model.clone(),
            text: entry.enhanced_text.clone(),
            updated_at: entry.updated_at,
        }
    }
}

/// One stored daily summary, unique per author, date and repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummaryRecord {
    pub id: String,
    pub author_name: String,
    pub date: NaiveDate,
    pub basic_text: String,
    pub repository: String,
    /// Resolved at read time; `None` once the linked enhancement is deleted.
    pub enhancement: Option<EnhancementRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DailySummaryRecord {
    pub fn has_enhancement(&self) -> bool {
        self.enhancement.is_some()
    }

    /// Enhanced text when present, otherwise the basic summary.
    pub fn display_text(&self) -> &str {
        self.enhancement
            .as_ref()
            .map(|e| e.text.as_str())
            .unwrap_or(&self.basic_text)
    }
}

/// Input for [`save_daily_summary`](super::SummaryStore::save_daily_summary).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDailySummary {
    pub author_name: String,
    pub date: NaiveDate,
    pub basic_text: String,
    pub repository: String,
}

/// Outcome of one enhancement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageStatus {
    Success,
    Error,
}

impl UsageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageStatus::Success => "success",
            UsageStatus::Error => "error",
        }
    }
}

impl fmt::Display for UsageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UsageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(UsageStatus::Success),
            "error" => Ok(UsageStatus::Error),
            _ => Err(format!("Unknown usage status: {}", s)),
        }
    }
}

/// Append-only metrics entry for one enhancement attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub tokens_used: u64,
    pub duration_ms: u64,
    pub status: UsageStatus,
    pub error_message: Option<String>,
    pub author_name: String,
}
