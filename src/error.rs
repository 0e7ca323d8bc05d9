//! Error types for daybook modules using thiserror.

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Errors from request validation. Raised before any provider or store work.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Author must not be empty")]
    EmptyAuthor,

    #[error("Author '{0}' contains control characters")]
    InvalidAuthor(String),

    #[error("Could not parse since date '{0}'. Use YYYY-MM-DD, today, yesterday, or a relative value like 7d or 2w")]
    InvalidSince(String),

    #[error("Since date {since} is after today ({today})")]
    FutureSince { since: NaiveDate, today: NaiveDate },
}

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Failed to open repository: {0}")]
    OpenRepository(#[source] git2::Error),

    #[error("Failed to parse commit: {0}")]
    ParseCommit(#[source] git2::Error),

    #[error("Failed to walk commit history: {0}")]
    RevwalkError(#[source] git2::Error),

    #[error("Commit {hash} has invalid timestamp (seconds={seconds})")]
    InvalidTimestamp { hash: String, seconds: i64 },

    #[error("Commit walk task failed: {0}")]
    TaskFailed(String),
}

/// Errors from text-generation providers.
///
/// These never escape the pipeline: every variant is a fallback trigger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider rate limited{}", .retry_after_secs.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Provider timed out after {0} ms")]
    Timeout(u64),

    #[error("Provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors from the persistence gateway. Each variant names the operation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error during {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to prepare database location {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stored row is invalid during {operation}: {detail}")]
    InvalidRow {
        operation: &'static str,
        detail: String,
    },

    #[error("Store lock poisoned during {0}")]
    Poisoned(&'static str),
}

impl StoreError {
    pub(crate) fn db(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| StoreError::Database { operation, source }
    }
}

/// Request-level failure returned by the summary pipeline.
///
/// Provider failures are absent on purpose: they degrade to basic summaries.
#[derive(Error, Debug)]
pub enum SummaryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Repository error at {}: {source}", .location.display())]
    Repository {
        location: PathBuf,
        #[source]
        source: GitError,
    },

    #[error("Persistence failed for author '{author}': {source}")]
    Persistence {
        author: String,
        #[source]
        source: StoreError,
    },
}
