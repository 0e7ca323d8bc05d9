//! Provider-backed enhancement of daily summaries and its usage metrics.

pub mod orchestrator;
pub mod usage;

pub use orchestrator::{EnhancementOrchestrator, EnhancementOutcome, EnhancementSettings};
pub use usage::{estimate_tokens, UsageRecorder, UsageStats};
