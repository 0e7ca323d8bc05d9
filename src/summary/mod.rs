//! Day bucketing, basic rendering, and cache validity.

pub mod basic;
pub mod cache;
pub mod grouping;

pub use basic::{render_basic, DATE_HEADER_FORMAT};
pub use cache::{evaluate, CacheDecision, CommitHashSet, StoredHashes};
pub use grouping::{group_by_day, DayBoundary, DayBucket, DayWindow};
