//! Deterministic plain-text day summaries.

use chrono::NaiveDate;

use crate::git::Commit;

/// Date header format for rendered summaries.
pub const DATE_HEADER_FORMAT: &str = "%Y-%m-%d";

/// Render a day's commits as a date header followed by one bullet per commit.
///
/// Commits are rendered in the order given, which is chronological when they
/// come from [`group_by_day`](super::grouping::group_by_day). Messages are
/// copied verbatim. The result has no trailing newline.
pub fn render_basic(date: NaiveDate, commits: &[Commit]) -> String {
    let mut text = date.format(DATE_HEADER_FORMAT).to_string();

    for commit in commits {
        text.push_str("\n- ");
        text.push_str(&commit.message);
    }

    text
}
