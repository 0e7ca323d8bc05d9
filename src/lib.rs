//! daybook - Daily work summaries from git commits.
//!
//! # Overview
//!
//! daybook groups an author's commits into calendar days, renders a plain
//! summary for each day, and optionally asks a text-generation provider
//! (Claude Code CLI or an OpenAI-compatible endpoint) for a prose version.
//! Enhanced text is cached per author and day and reused for as long as the
//! day's commit set is unchanged.

pub mod config;
pub mod enhance;
pub mod error;
pub mod git;
pub mod llm;
pub mod pipeline;
pub mod store;
pub mod summary;

// Re-export commonly used types
pub use config::Settings;
pub use enhance::{EnhancementOrchestrator, EnhancementOutcome, EnhancementSettings, UsageRecorder, UsageStats};
pub use error::{GitError, ProviderError, StoreError, SummaryError, ValidationError};
pub use git::{Commit, GitSource, SourceControl};
pub use llm::{GenerationConfig, Provider, TextGenerator};
pub use pipeline::{parse_since, GenerateRequest, PipelineConfig, StoredSummaryPolicy, SummaryPipeline};
pub use store::{DailySummaryRecord, MemoryStore, SqliteStore, SummaryStore, UsageRecord, UsageStatus};
pub use summary::{CacheDecision, CommitHashSet, DayBoundary, DayBucket};
