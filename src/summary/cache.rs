//! Cache validity checks for enhanced summaries.
//!
//! A cached enhancement is only reusable when it was generated from exactly
//! the commits the day has now. Order does not matter; membership does.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::store::CachedEnhancement;

/// Order-independent set of commit hashes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CommitHashSet(BTreeSet<String>);

impl CommitHashSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Encode as a sorted JSON array of strings.
    pub fn encode(&self) -> String {
        serde_json::Value::Array(
            self.0
                .iter()
                .cloned()
                .map(serde_json::Value::String)
                .collect(),
        )
        .to_string()
    }

    /// Decode a stored JSON array. Anything other than an array of non-empty
    /// strings is reported as [`StoredHashes::Corrupt`].
    pub fn decode(raw: &str) -> StoredHashes {
        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(hashes) if hashes.iter().all(|h| !h.trim().is_empty()) => {
                StoredHashes::Decoded(hashes.into_iter().collect())
            }
            _ => StoredHashes::Corrupt {
                raw: raw.to_string(),
            },
        }
    }
}

impl FromIterator<String> for CommitHashSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for CommitHashSet {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

/// Hash set as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredHashes {
    Decoded(CommitHashSet),
    /// The stored value could not be decoded; holds it for diagnostics.
    Corrupt { raw: String },
}

impl From<CommitHashSet> for StoredHashes {
    fn from(set: CommitHashSet) -> Self {
        StoredHashes::Decoded(set)
    }
}

/// Result of checking a day's commits against its cached enhancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    /// Cached enhancement matches the current commit set.
    Hit,
    /// Nothing cached.
    Miss,
    /// Cached enhancement belongs to a different commit set or is unreadable.
    /// The caller must delete it before regenerating.
    Stale,
}

impl CacheDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheDecision::Hit => "hit",
            CacheDecision::Miss => "miss",
            CacheDecision::Stale => "stale",
        }
    }
}

/// Decide whether `existing` can be reused for a day whose commits hash to `current`.
pub fn evaluate(current: &CommitHashSet, existing: Option<&CachedEnhancement>) -> CacheDecision {
    let Some(entry) = existing else {
        return CacheDecision::Miss;
    };

    match &entry.commit_hashes {
        StoredHashes::Decoded(stored) if stored == current => CacheDecision::Hit,
        StoredHashes::Decoded(_) | StoredHashes::Corrupt { .. } => CacheDecision::Stale,
    }
}
