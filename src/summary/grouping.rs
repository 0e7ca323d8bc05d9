//! Calendar-day bucketing of commits.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};

use crate::git::Commit;

use super::cache::CommitHashSet;

/// Which time zone decides a commit's calendar day.
///
/// The boundary also drives `since` filtering and the "today" usage window,
/// so it must be the same for every run against one database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayBoundary {
    #[default]
    Utc,
    /// The executing process's local zone.
    Local,
    Fixed(FixedOffset),
}

impl DayBoundary {
    /// Wall-clock reading of an instant in this zone.
    pub fn wall_clock(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            DayBoundary::Utc => instant.naive_utc(),
            DayBoundary::Local => instant.with_timezone(&Local).naive_local(),
            DayBoundary::Fixed(offset) => instant.with_timezone(offset).naive_local(),
        }
    }

    /// Calendar day of an instant.
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.wall_clock(instant).date()
    }

    /// First instant of a calendar day.
    pub fn start_of(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_time(NaiveTime::MIN);
        match self {
            DayBoundary::Utc => Utc.from_utc_datetime(&midnight),
            // A DST gap at midnight has no local instant; fall back to reading it as UTC.
            DayBoundary::Local => Local
                .from_local_datetime(&midnight)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&midnight)),
            DayBoundary::Fixed(offset) => offset
                .from_local_datetime(&midnight)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&midnight)),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.date_of(Utc::now())
    }

    /// Half-open `[start, end)` window covering one calendar day.
    pub fn window(&self, date: NaiveDate) -> DayWindow {
        let next = date.succ_opt().unwrap_or(date);
        let start = self.start_of(date);
        let end = if next == date {
            start + Duration::days(1)
        } else {
            self.start_of(next)
        };
        DayWindow { start, end }
    }
}

impl fmt::Display for DayBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayBoundary::Utc => f.write_str("utc"),
            DayBoundary::Local => f.write_str("local"),
            DayBoundary::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

impl FromStr for DayBoundary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        match value.to_lowercase().as_str() {
            "utc" | "z" => return Ok(DayBoundary::Utc),
            "local" => return Ok(DayBoundary::Local),
            _ => {}
        }
        parse_offset(value)
            .map(DayBoundary::Fixed)
            .ok_or_else(|| format!("Unknown timezone '{}': use utc, local, or +HH:MM", s))
    }
}

/// Parse `+HH:MM`, `-HHMM`, or `+HH`.
fn parse_offset(value: &str) -> Option<FixedOffset> {
    let (sign, rest) = match value.chars().next()? {
        '+' => (1, &value[1..]),
        '-' => (-1, &value[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Half-open time range for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

/// All commits of one author on one calendar day, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayBucket {
    pub date: NaiveDate,
    /// Zone that put these commits on `date`.
    pub boundary: DayBoundary,
    pub commits: Vec<Commit>,
}

impl DayBucket {
    pub fn hashes(&self) -> CommitHashSet {
        self.commits.iter().map(|c| c.hash.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

/// Partition commits into day buckets keyed (and therefore ordered) by date.
///
/// Nothing is dropped or deduplicated. Within a bucket commits are sorted by
/// timestamp, with the hash as tie-breaker so the order is deterministic.
pub fn group_by_day<I>(commits: I, boundary: DayBoundary) -> BTreeMap<NaiveDate, DayBucket>
where
    I: IntoIterator<Item = Commit>,
{
    let mut buckets: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();

    for commit in commits {
        let date = boundary.date_of(commit.timestamp);
        buckets
            .entry(date)
            .or_insert_with(|| DayBucket {
                date,
                boundary,
                commits: Vec::new(),
            })
            .commits
            .push(commit);
    }

    for bucket in buckets.values_mut() {
        bucket
            .commits
            .sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.hash.cmp(&b.hash)));
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(hash: &str, rfc3339: &str, message: &str) -> Commit {
        Commit {
            hash: hash.to_string(),
            author_name: "A".to_string(),
            author_email: "a@example.com".to_string(),
            timestamp: DateTime::parse_from_rfc3339(rfc3339)
                .unwrap()
                .with_timezone(&Utc),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_groups_by_utc_day_and_sorts_ascending() {
        let commits = vec![
            commit("c3", "2024-03-02T09:00:00Z", "third"),
            commit("c2", "2024-03-01T14:00:00Z", "second"),
            commit("c1", "2024-03-01T10:00:00Z", "first"),
        ];

        let buckets = group_by_day(commits, DayBoundary::Utc);
        let dates: Vec<_> = buckets.keys().map(|d| d.to_string()).collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-03-02"]);

        let first_day = &buckets[&NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()];
        let messages: Vec<_> = first_day.commits.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
    }

    #[test]
    fn test_fixed_offset_moves_commit_to_next_day() {
        let commits = vec![commit("c1", "2024-03-01T23:30:00Z", "late")];
        let boundary: DayBoundary = "+02:00".parse().unwrap();

        let buckets = group_by_day(commits, boundary);
        let bucket = &buckets[&NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()];
        assert_eq!(bucket.boundary, boundary);
        assert_eq!(
            boundary.wall_clock(bucket.commits[0].timestamp).to_string(),
            "2024-03-02 01:30:00"
        );
    }

    #[test]
    fn test_keeps_duplicate_hashes() {
        let commits = vec![
            commit("same", "2024-03-01T10:00:00Z", "one"),
            commit("same", "2024-03-01T10:00:00Z", "one"),
        ];
        let buckets = group_by_day(commits, DayBoundary::Utc);
        assert_eq!(buckets.values().next().unwrap().commits.len(), 2);
    }

    #[test]
    fn test_equal_timestamps_ordered_by_hash() {
        let commits = vec![
            commit("bbb", "2024-03-01T10:00:00Z", "b"),
            commit("aaa", "2024-03-01T10:00:00Z", "a"),
        ];
        let buckets = group_by_day(commits, DayBoundary::Utc);
        let bucket = buckets.values().next().unwrap();
        assert_eq!(bucket.commits[0].hash, "aaa");
    }

    #[test]
    fn test_parse_day_boundary() {
        assert_eq!("UTC".parse::<DayBoundary>().unwrap(), DayBoundary::Utc);
        assert_eq!("local".parse::<DayBoundary>().unwrap(), DayBoundary::Local);
        assert_eq!(
            "-0530".parse::<DayBoundary>().unwrap(),
            DayBoundary::Fixed(FixedOffset::west_opt(5 * 3600 + 30 * 60).unwrap())
        );
        assert!("+25:00".parse::<DayBoundary>().is_err());
        assert!("Europe/Paris".parse::<DayBoundary>().is_err());
    }

    #[test]
    fn test_window_is_half_open() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let window = DayBoundary::Utc.window(date);
        assert!(window.contains(DayBoundary::Utc.start_of(date)));
        assert!(!window.contains(window.end));
        assert_eq!(window.end - window.start, Duration::days(1));
    }
}
