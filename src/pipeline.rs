//! Request-level orchestration: commits in, stored daily summaries out.

use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use chrono::{Duration, NaiveDate};
use regex_lite::Regex;
use tracing::{debug, info};

use crate::enhance::{EnhancementOrchestrator, EnhancementSettings};
use crate::error::{StoreError, SummaryError, ValidationError};
use crate::git::SourceControl;
use crate::llm::TextGenerator;
use crate::store::{DailySummaryRecord, NewDailySummary, SummaryStore};
use crate::summary::{group_by_day, render_basic, DayBoundary, DayBucket};

/// Whether stored enhanced summaries may be returned without re-reading commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoredSummaryPolicy {
    /// Always re-read commits and let the cache check each day.
    #[default]
    Revalidate,
    /// Return stored summaries as-is when any of them is enhanced.
    Trust,
}

/// Fixed settings for one pipeline instance.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Repository the commits are read from. Also part of each record's key.
    pub repository: PathBuf,
    pub boundary: DayBoundary,
    pub enhancement: EnhancementSettings,
    pub stored_policy: StoredSummaryPolicy,
}

/// Input for [`SummaryPipeline::generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub author: String,
    pub since: NaiveDate,
    /// Delete and regenerate every day's enhancement.
    pub force_refresh: bool,
    /// When false the provider is never called.
    pub use_enhancement: bool,
}

impl GenerateRequest {
    pub fn new(author: impl Into<String>, since: NaiveDate) -> Self {
        Self {
            author: author.into(),
            since,
            force_refresh: false,
            use_enhancement: true,
        }
    }
}

/// Composes commit fetching, day grouping, enhancement and persistence.
pub struct SummaryPipeline {
    source: Arc<dyn SourceControl>,
    store: Arc<dyn SummaryStore>,
    enhancer: EnhancementOrchestrator,
    config: PipelineConfig,
}

impl SummaryPipeline {
    pub fn new(
        source: Arc<dyn SourceControl>,
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn SummaryStore>,
        config: PipelineConfig,
    ) -> Self {
        let enhancer =
            EnhancementOrchestrator::new(generator, store.clone(), config.enhancement.clone());
        Self {
            source,
            store,
            enhancer,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Summaries for every day on or after `request.since` with commits, oldest first.
    pub async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<Vec<DailySummaryRecord>, SummaryError> {
        let author = self.validate(&request.author, request.since)?;

        if self.config.stored_policy == StoredSummaryPolicy::Trust
            && request.use_enhancement
            && !request.force_refresh
        {
            let stored = self
                .store
                .get_daily_summaries(author, request.since, &self.repository_key())
                .await
                .map_err(|e| persistence(author, e))?;
            if stored.iter().any(DailySummaryRecord::has_enhancement) {
                debug!(author = %author, count = stored.len(), "Returning stored summaries");
                return Ok(stored);
            }
        }

        self.process(
            author,
            request.since,
            request.force_refresh,
            request.use_enhancement,
        )
        .await
    }

    /// Drop every cached enhancement on or after `since`, then regenerate.
    pub async fn refresh(
        &self,
        author: &str,
        since: NaiveDate,
    ) -> Result<Vec<DailySummaryRecord>, SummaryError> {
        let author = self.validate(author, since)?;

        let removed = self
            .store
            .delete_cached_enhancements(author, since)
            .await
            .map_err(|e| persistence(author, e))?;
        info!(author = %author, since = %since, removed, "Cleared cached enhancements");

        self.process(author, since, true, true).await
    }

    fn validate<'a>(&self, author: &'a str, since: NaiveDate) -> Result<&'a str, ValidationError> {
        let author = author.trim();
        if author.is_empty() {
            return Err(ValidationError::EmptyAuthor);
        }
        if author.chars().any(char::is_control) {
            return Err(ValidationError::InvalidAuthor(author.to_string()));
        }

        let today = self.config.boundary.today();
        if since > today {
            return Err(ValidationError::FutureSince { since, today });
        }
        Ok(author)
    }

    fn repository_key(&self) -> String {
        self.config.repository.display().to_string()
    }

    async fn process(
        &self,
        author: &str,
        since: NaiveDate,
        force: bool,
        use_enhancement: bool,
    ) -> Result<Vec<DailySummaryRecord>, SummaryError> {
        let start = self.config.boundary.start_of(since);
        let commits = self
            .source
            .get_commits(author, start, &self.config.repository)
            .await
            .map_err(|source| SummaryError::Repository {
                location: self.config.repository.clone(),
                source,
            })?;

        let buckets = group_by_day(commits, self.config.boundary);
        debug!(author = %author, days = buckets.len(), "Grouped commits by day");

        let mut records = Vec::with_capacity(buckets.len());
        for bucket in buckets.values().filter(|b| !b.is_empty() && b.date >= since) {
            let record = self
                .summarize_day(author, bucket, force, use_enhancement)
                .await
                .map_err(|e| persistence(author, e))?;
            records.push(record);
        }

        records.sort_by_key(|r| r.date);
        Ok(records)
    }

    async fn summarize_day(
        &self,
        author: &str,
        bucket: &DayBucket,
        force: bool,
        use_enhancement: bool,
    ) -> Result<DailySummaryRecord, StoreError> {
        let basic_text = render_basic(bucket.date, &bucket.commits);

        let enhancement_id = if use_enhancement {
            let outcome = self.enhancer.enhance(author, bucket, force).await?;
            outcome.enhancement().map(|e| e.id.clone())
        } else {
            None
        };

        let record = self
            .store
            .save_daily_summary(
                &NewDailySummary {
                    author_name: author.to_string(),
                    date: bucket.date,
                    basic_text,
                    repository: self.repository_key(),
                },
                enhancement_id.as_deref(),
            )
            .await?;

        debug!(
            author = %author,
            date = %bucket.date,
            commits = bucket.commits.len(),
            enhanced = record.has_enhancement(),
            "Saved daily summary"
        );
        Ok(record)
    }
}

fn persistence(author: &str, source: StoreError) -> SummaryError {
    SummaryError::Persistence {
        author: author.to_string(),
        source,
    }
}

/// `Nd` or `Nw`, with optional space between count and unit.
static RELATIVE_SINCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,4})\s*([dw])$").expect("Invalid regex"));

/// Parse a `since` value relative to `today`.
///
/// Accepts `YYYY-MM-DD`, `today`, `yesterday`, `Nd` and `Nw`.
pub fn parse_since(input: &str, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    let value = input.trim().to_lowercase();
    let invalid = || ValidationError::InvalidSince(input.to_string());

    match value.as_str() {
        "today" => return Ok(today),
        "yesterday" => return today.pred_opt().ok_or_else(invalid),
        _ => {}
    }

    if let Ok(date) = NaiveDate::parse_from_str(&value, "%Y-%m-%d") {
        return Ok(date);
    }

    let Some(captures) = RELATIVE_SINCE.captures(&value) else {
        return Err(invalid());
    };

    let count: i64 = captures[1].parse().map_err(|_| invalid())?;
    let days = if &captures[2] == "w" { count * 7 } else { count };
    today
        .checked_sub_signed(Duration::days(days))
        .ok_or_else(invalid)
}
