//! Source-control provider abstraction.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use git2::Repository;
use tracing::debug;

use crate::error::GitError;

use super::commits::{fetch_author_commits, Commit};

/// Supplies commits for an author since a point in time.
///
/// Must return an empty list for an unknown author and fail with a
/// [`GitError`] when `location` is not a repository.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceControl: Send + Sync {
    async fn get_commits(
        &self,
        author: &str,
        since: DateTime<Utc>,
        location: &Path,
    ) -> Result<Vec<Commit>, GitError>;
}

/// Reads commits from a local git repository with git2.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitSource;

#[async_trait]
impl SourceControl for GitSource {
    async fn get_commits(
        &self,
        author: &str,
        since: DateTime<Utc>,
        location: &Path,
    ) -> Result<Vec<Commit>, GitError> {
        let author = author.to_string();
        let location: PathBuf = location.to_path_buf();

        // git2 is blocking; keep it off the async worker threads.
        tokio::task::spawn_blocking(move || {
            let repo = Repository::open(&location).map_err(GitError::OpenRepository)?;
            let commits = fetch_author_commits(&repo, &author, since)?;
            debug!(
                author = %author,
                count = commits.len(),
                "Fetched commits from {}",
                location.display()
            );
            Ok(commits)
        })
        .await
        .map_err(|e| GitError::TaskFailed(e.to_string()))?
    }
}

/// Read `user.name` from the repository's git config, if set.
pub fn configured_author(location: &Path) -> Option<String> {
    let repo = Repository::open(location).ok()?;
    let config = repo.config().ok()?;
    config
        .get_string("user.name")
        .ok()
        .filter(|name| !name.trim().is_empty())
}
