//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use git2::{Oid, Repository, Signature, Time};

use daybook::error::{GitError, ProviderError, StoreError};
use daybook::git::{Commit, SourceControl};
use daybook::llm::{GenerationConfig, TextGenerator};
use daybook::store::{
    CachedEnhancement, DailySummaryRecord, MemoryStore, NewCachedEnhancement, NewDailySummary,
    SummaryStore, UsageRecord,
};
use daybook::summary::{group_by_day, DayBoundary, DayBucket};

/// Create a temporary directory for test output.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// A test git repository builder for integration tests.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
    counter: std::cell::Cell<u32>,
}

impl TestRepo {
    /// Create a new empty git repository in a temp directory.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let repo = Repository::init(dir.path()).expect("Failed to init git repo");
        Self {
            dir,
            repo,
            counter: std::cell::Cell::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Set `user.name` in the repository's local config.
    pub fn set_user_name(&self, name: &str) {
        let mut config = self.repo.config().expect("Failed to open config");
        config.set_str("user.name", name).expect("Failed to set user.name");
    }

    /// Create a commit by the default test user at the current time.
    pub fn commit(&self, message: &str) -> Oid {
        self.commit_as("Test User", "test@example.com", Utc::now(), message)
    }

    /// Create a commit with an explicit author and timestamp. Returns the commit OID.
    pub fn commit_as(&self, name: &str, email: &str, when: DateTime<Utc>, message: &str) -> Oid {
        let sig = Signature::new(name, email, &Time::new(when.timestamp(), 0))
            .expect("Failed to create signature");

        // Each commit changes the file so the tree differs.
        let n = self.counter.get() + 1;
        self.counter.set(n);
        let file_path = self.dir.path().join("test.txt");
        std::fs::write(&file_path, format!("{}\n{}", message, n)).expect("Failed to write test file");

        let mut index = self.repo.index().expect("Failed to get index");
        index.add_path(Path::new("test.txt")).expect("Failed to add file");
        index.write().expect("Failed to write index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");

        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to create commit")
    }
}

/// UTC instant on a day of January 2024.
pub fn jan(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
}

pub fn commit(hash: &str, when: DateTime<Utc>, message: &str) -> Commit {
    Commit {
        hash: hash.to_string(),
        author_name: "Ada".to_string(),
        author_email: "ada@example.com".to_string(),
        timestamp: when,
        message: message.to_string(),
    }
}

/// The single day bucket holding `commits` under `boundary`.
pub fn one_day(commits: Vec<Commit>, boundary: DayBoundary) -> DayBucket {
    let mut buckets = group_by_day(commits, boundary);
    assert_eq!(buckets.len(), 1, "commits span more than one day");
    buckets.pop_first().unwrap().1
}

/// Ordered log of collaborator calls shared by the fakes below.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Source control backed by a replaceable in-memory commit list.
pub struct FakeSource {
    commits: Mutex<Vec<Commit>>,
    events: EventLog,
}

impl FakeSource {
    pub fn new(commits: Vec<Commit>, events: EventLog) -> Self {
        Self {
            commits: Mutex::new(commits),
            events,
        }
    }

    pub fn set_commits(&self, commits: Vec<Commit>) {
        *self.commits.lock().unwrap() = commits;
    }
}

#[async_trait]
impl SourceControl for FakeSource {
    async fn get_commits(
        &self,
        author: &str,
        since: DateTime<Utc>,
        _location: &Path,
    ) -> Result<Vec<Commit>, GitError> {
        self.events.lock().unwrap().push("get_commits".to_string());
        Ok(self
            .commits
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.timestamp >= since && c.authored_by(author))
            .cloned()
            .collect())
    }
}

/// What a [`ScriptedGenerator`] returns.
#[derive(Clone)]
pub enum Reply {
    /// Prose naming the model and the first commit message.
    Echo,
    Text(String),
    Fail(ProviderError),
}

/// Text generator with a fixed reply that counts its calls.
pub struct ScriptedGenerator {
    reply: Mutex<Reply>,
    calls: Mutex<Vec<String>>,
    events: EventLog,
}

impl ScriptedGenerator {
    pub fn new(reply: Reply, events: EventLog) -> Self {
        Self {
            reply: Mutex::new(reply),
            calls: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Model of every call, in order.
    pub fn models(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate_summary(
        &self,
        bucket: &DayBucket,
        config: &GenerationConfig,
    ) -> Result<String, ProviderError> {
        let commits = &bucket.commits;
        self.calls.lock().unwrap().push(config.model.clone());
        self.events.lock().unwrap().push("generate_summary".to_string());

        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Reply::Echo => Ok(format!(
                "[{}] Worked on {} ({} commits).",
                config.model,
                commits.first().map(|c| c.message.as_str()).unwrap_or(""),
                commits.len()
            )),
            Reply::Text(text) => Ok(text),
            Reply::Fail(e) => Err(e),
        }
    }
}

/// Store wrapper that logs evictions into an [`EventLog`] before delegating.
///
/// `fail_on` makes every call to one named operation return a database error.
pub struct LoggingStore {
    inner: Arc<MemoryStore>,
    events: EventLog,
    failing: Mutex<Option<&'static str>>,
}

impl LoggingStore {
    pub fn new(inner: Arc<MemoryStore>, events: EventLog) -> Self {
        Self {
            inner,
            events,
            failing: Mutex::new(None),
        }
    }

    pub fn fail_on(&self, operation: &'static str) {
        *self.failing.lock().unwrap() = Some(operation);
    }

    fn check(&self, operation: &'static str) -> Result<(), StoreError> {
        if *self.failing.lock().unwrap() == Some(operation) {
            return Err(StoreError::Database {
                operation,
                source: sqlx::Error::PoolClosed,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SummaryStore for LoggingStore {
    async fn get_daily_summaries(
        &self,
        author: &str,
        since: NaiveDate,
        repository: &str,
    ) -> Result<Vec<DailySummaryRecord>, StoreError> {
        self.check("get_daily_summaries")?;
        self.inner.get_daily_summaries(author, since, repository).await
    }

    async fn save_daily_summary<'a>(
        &self,
        summary: &NewDailySummary,
        enhancement_id: Option<&'a str>,
    ) -> Result<DailySummaryRecord, StoreError> {
        self.check("save_daily_summary")?;
        self.inner.save_daily_summary(summary, enhancement_id).await
    }

    async fn get_cached_enhancement(
        &self,
        author: &str,
        date: NaiveDate,
    ) -> Result<Option<CachedEnhancement>, StoreError> {
        self.check("get_cached_enhancement")?;
        self.inner.get_cached_enhancement(author, date).await
    }

    async fn save_cached_enhancement(
        &self,
        entry: &NewCachedEnhancement,
    ) -> Result<CachedEnhancement, StoreError> {
        self.check("save_cached_enhancement")?;
        self.inner.save_cached_enhancement(entry).await
    }

    async fn delete_cached_enhancement(
        &self,
        author: &str,
        date: NaiveDate,
    ) -> Result<bool, StoreError> {
        self.events
            .lock()
            .unwrap()
            .push("delete_cached_enhancement".to_string());
        self.check("delete_cached_enhancement")?;
        self.inner.delete_cached_enhancement(author, date).await
    }

    async fn delete_cached_enhancements(
        &self,
        author: &str,
        since: NaiveDate,
    ) -> Result<u64, StoreError> {
        self.events
            .lock()
            .unwrap()
            .push("delete_cached_enhancements".to_string());
        self.check("delete_cached_enhancements")?;
        self.inner.delete_cached_enhancements(author, since).await
    }

    async fn record_usage(&self, entry: &UsageRecord) -> Result<(), StoreError> {
        self.check("record_usage")?;
        self.inner.record_usage(entry).await
    }

    async fn list_usage(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UsageRecord>, StoreError> {
        self.check("list_usage")?;
        self.inner.list_usage(start, end).await
    }
}
