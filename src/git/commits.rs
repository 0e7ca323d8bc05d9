//! Commit fetching filtered by author and start time.

use chrono::{DateTime, TimeZone, Utc};
use git2::Repository;
use serde::{Deserialize, Serialize};

use crate::error::GitError;

/// A single commit as seen by the summary pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
    /// Summary line of the commit message, trimmed.
    pub message: String,
}

impl Commit {
    /// Create a Commit from a git2 Commit.
    pub fn from_git2_commit(commit: &git2::Commit) -> Result<Self, GitError> {
        let hash = commit.id().to_string();
        let seconds = commit.time().seconds();
        let timestamp = Utc
            .timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| GitError::InvalidTimestamp {
                hash: hash.clone(),
                seconds,
            })?;

        let author = commit.author();
        let message = commit
            .message()
            .and_then(|m| m.lines().find(|line| !line.trim().is_empty()))
            .unwrap_or("")
            .trim()
            .to_string();

        Ok(Self {
            hash,
            author_name: author.name().unwrap_or("").to_string(),
            author_email: author.email().unwrap_or("").to_string(),
            timestamp,
            message,
        })
    }

    /// Whether this commit matches an author pattern the way `git log --author` does:
    /// a case-insensitive substring of `"Name <email>"`.
    pub fn authored_by(&self, author: &str) -> bool {
        let ident = format!("{} <{}>", self.author_name, self.author_email).to_lowercase();
        ident.contains(&author.trim().to_lowercase())
    }
}

/// Fetch every commit reachable from HEAD written by `author` at or after `since`.
///
/// An unborn HEAD (empty repository) yields an empty list. Commits are returned
/// newest first; callers that need chronological order group them by day.
pub fn fetch_author_commits(
    repo: &Repository,
    author: &str,
    since: DateTime<Utc>,
) -> Result<Vec<Commit>, GitError> {
    let head_oid = match repo.head().ok().and_then(|head| head.target()) {
        Some(oid) => oid,
        None => return Ok(Vec::new()),
    };

    let mut revwalk = repo.revwalk().map_err(GitError::RevwalkError)?;
    revwalk.push(head_oid).map_err(GitError::RevwalkError)?;
    revwalk
        .set_sorting(git2::Sort::TIME)
        .map_err(GitError::RevwalkError)?;

    let mut commits = Vec::new();

    for oid_result in revwalk {
        let oid = oid_result.map_err(GitError::RevwalkError)?;
        let commit = repo.find_commit(oid).map_err(GitError::ParseCommit)?;
        let parsed = Commit::from_git2_commit(&commit)?;

        if parsed.timestamp >= since && parsed.authored_by(author) {
            commits.push(parsed);
        }
    }

    Ok(commits)
}
