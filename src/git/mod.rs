//! Git operations using git2-rs.

pub mod commits;
pub mod source;

pub use commits::{fetch_author_commits, Commit};
pub use source::{configured_author, GitSource, SourceControl};

#[cfg(test)]
pub use source::MockSourceControl;
