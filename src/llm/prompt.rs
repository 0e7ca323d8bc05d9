//! Prompt construction for daily summaries.

use crate::summary::{DayBucket, DATE_HEADER_FORMAT};

/// Neutralize markdown that could be read as instructions, and cap length.
pub fn sanitize_for_prompt(text: &str) -> String {
    text.replace("```", "'''")
        .replace("##", "//")
        .lines()
        .take(50)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the generation prompt for one day's commits.
///
/// The day and the `[HH:MM]` times are read in the bucket's own zone, so the
/// prompt names the same date as the basic summary header.
pub fn build_prompt(bucket: &DayBucket) -> String {
    let date = bucket.date.format(DATE_HEADER_FORMAT);

    let list = bucket
        .commits
        .iter()
        .map(|c| {
            format!(
                "- [{}] {}",
                bucket.boundary.wall_clock(c.timestamp).format("%H:%M"),
                sanitize_for_prompt(&c.message)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are writing a developer's daily work log.

Below are the commits made on {date}, oldest first.

Write a concise summary of the day's work in the first person, as two to four
sentences of plain prose. Group related commits, mention what changed and why
when the messages say so, and do not invent work that is not listed.

Rules:
- No headings, bullet points, or markdown.
- Do not quote commit hashes.
- Return only the summary text.

Commits:
{list}"#
    )
}
