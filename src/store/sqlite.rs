//! SQLite-backed [`SummaryStore`] implementation.
//!
//! Dates are stored as `YYYY-MM-DD` text so range filters compare
//! lexicographically; timestamps are Unix milliseconds. Commit hash sets are
//! stored as JSON arrays and validated on the way out.
//!
//! # Write-Ahead Logging (WAL)
//!
//! WAL mode lets the CLI read usage stats while another invocation writes.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use crate::enhance::usage::UsageStats;
use crate::error::StoreError;
use crate::summary::{CommitHashSet, DayWindow};

use super::{
    timestamp_now, CachedEnhancement, DailySummaryRecord, EnhancementRef, NewCachedEnhancement,
    NewDailySummary, SummaryStore, UsageRecord, UsageStatus,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

const SUMMARY_SELECT: &str = r#"
    SELECT s.id, s.author_name, s.date, s.basic_text, s.repository,
           s.created_at, s.updated_at,
           e.id AS enhancement_id, e.model AS enhancement_model,
           e.enhanced_text AS enhancement_text, e.updated_at AS enhancement_updated_at
    FROM daily_summaries s
    LEFT JOIN cached_enhancements e ON e.id = s.enhancement_id
"#;

/// SQLite implementation of the [`SummaryStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and apply the schema.
    ///
    /// Parent directories are created. The pool holds up to 5 connections.
    pub async fn connect(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(StoreError::db("connect"))?;

        let store = Self { pool };
        store.migrate().await?;
        debug!("Opened summary database at {}", path.display());
        Ok(store)
    }

    /// Private in-memory database. A single connection that never idles out,
    /// since each SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(StoreError::db("connect"))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(StoreError::db("connect"))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist. Idempotent.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cached_enhancements (
                id TEXT PRIMARY KEY,
                author_name TEXT NOT NULL,
                date TEXT NOT NULL,
                commit_hashes TEXT NOT NULL,
                enhanced_text TEXT NOT NULL,
                model TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(author_name, date)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::db("migrate"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_summaries (
                id TEXT PRIMARY KEY,
                author_name TEXT NOT NULL,
                date TEXT NOT NULL,
                basic_text TEXT NOT NULL,
                repository TEXT NOT NULL,
                enhancement_id TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(author_name, date, repository)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::db("migrate"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                model TEXT NOT NULL,
                tokens_used INTEGER NOT NULL,
                duration_ms INTEGER NOT NULL,
                status TEXT NOT NULL,
                error_message TEXT,
                author_name TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::db("migrate"))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_usage_records_timestamp ON usage_records(timestamp)")
            .execute(&self.pool)
            .await
            .map_err(StoreError::db("migrate"))?;

        Ok(())
    }

    async fn fetch_summary(
        &self,
        author: &str,
        date: NaiveDate,
        repository: &str,
    ) -> Result<DailySummaryRecord, StoreError> {
        let sql = format!(
            "{SUMMARY_SELECT} WHERE s.author_name = ? AND s.date = ? AND s.repository = ?"
        );
        let row = sqlx::query(&sql)
            .bind(author)
            .bind(format_date(date))
            .bind(repository)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::db("save_daily_summary"))?;
        summary_from_row(&row, "save_daily_summary")
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(raw: &str, operation: &'static str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| StoreError::InvalidRow {
        operation,
        detail: format!("bad date '{}': {}", raw, e),
    })
}

fn parse_millis(ms: i64, operation: &'static str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| StoreError::InvalidRow {
        operation,
        detail: format!("bad timestamp {}", ms),
    })
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn column<'r, T>(row: &'r SqliteRow, name: &str, operation: &'static str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name).map_err(StoreError::db(operation))
}

fn summary_from_row(row: &SqliteRow, operation: &'static str) -> Result<DailySummaryRecord, StoreError> {
    let date: String = column(row, "date", operation)?;
    let enhancement_id: Option<String> = column(row, "enhancement_id", operation)?;

    let enhancement = match enhancement_id {
        Some(id) => {
            let updated_ms: i64 = column(row, "enhancement_updated_at", operation)?;
            Some(EnhancementRef {
                id,
                model: column(row, "enhancement_model", operation)?,
                text: column(row, "enhancement_text", operation)?,
                updated_at: parse_millis(updated_ms, operation)?,
            })
        }
        None => None,
    };

    Ok(DailySummaryRecord {
        id: column(row, "id", operation)?,
        author_name: column(row, "author_name", operation)?,
        date: parse_date(&date, operation)?,
        basic_text: column(row, "basic_text", operation)?,
        repository: column(row, "repository", operation)?,
        enhancement,
        created_at: parse_millis(column(row, "created_at", operation)?, operation)?,
        updated_at: parse_millis(column(row, "updated_at", operation)?, operation)?,
    })
}

fn enhancement_from_row(row: &SqliteRow, operation: &'static str) -> Result<CachedEnhancement, StoreError> {
    let date: String = column(row, "date", operation)?;
    let raw_hashes: String = column(row, "commit_hashes", operation)?;

    Ok(CachedEnhancement {
        id: column(row, "id", operation)?,
        author_name: column(row, "author_name", operation)?,
        date: parse_date(&date, operation)?,
        commit_hashes: CommitHashSet::decode(&raw_hashes),
        enhanced_text: column(row, "enhanced_text", operation)?,
        model: column(row, "model", operation)?,
        created_at: parse_millis(column(row, "created_at", operation)?, operation)?,
        updated_at: parse_millis(column(row, "updated_at", operation)?, operation)?,
    })
}

fn usage_from_row(row: &SqliteRow) -> Result<UsageRecord, StoreError> {
    const OP: &str = "list_usage";
    let status: String = column(row, "status", OP)?;

    Ok(UsageRecord {
        timestamp: parse_millis(column(row, "timestamp", OP)?, OP)?,
        model: column(row, "model", OP)?,
        tokens_used: to_u64(column(row, "tokens_used", OP)?),
        duration_ms: to_u64(column(row, "duration_ms", OP)?),
        status: status
            .parse::<UsageStatus>()
            .map_err(|detail| StoreError::InvalidRow { operation: OP, detail })?,
        error_message: column(row, "error_message", OP)?,
        author_name: column(row, "author_name", OP)?,
    })
}

#[async_trait]
impl SummaryStore for SqliteStore {
    async fn get_daily_summaries(
        &self,
        author: &str,
        since: NaiveDate,
        repository: &str,
    ) -> Result<Vec<DailySummaryRecord>, StoreError> {
        const OP: &str = "get_daily_summaries";
        let sql = format!(
            "{SUMMARY_SELECT} WHERE s.author_name = ? AND s.date >= ? AND s.repository = ? ORDER BY s.date ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(author)
            .bind(format_date(since))
            .bind(repository)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::db(OP))?;

        rows.iter().map(|row| summary_from_row(row, OP)).collect()
    }

    async fn save_daily_summary<'a>(
        &self,
        summary: &NewDailySummary,
        enhancement_id: Option<&'a str>,
    ) -> Result<DailySummaryRecord, StoreError> {
        let now = timestamp_now().timestamp_millis();

        // SET expressions see the old row, so the CASE compares before overwrite.
        sqlx::query(
            r#"
            INSERT INTO daily_summaries (id, author_name, date, basic_text, repository,
                                         enhancement_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(author_name, date, repository) DO UPDATE SET
                updated_at = CASE
                    WHEN daily_summaries.basic_text IS NOT excluded.basic_text
                      OR daily_summaries.enhancement_id IS NOT excluded.enhancement_id
                    THEN excluded.updated_at
                    ELSE daily_summaries.updated_at
                END,
                basic_text = excluded.basic_text,
                enhancement_id = excluded.enhancement_id
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&summary.author_name)
        .bind(format_date(summary.date))
        .bind(&summary.basic_text)
        .bind(&summary.repository)
        .bind(enhancement_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::db("save_daily_summary"))?;

        self.fetch_summary(&summary.author_name, summary.date, &summary.repository)
            .await
    }

    async fn get_cached_enhancement(
        &self,
        author: &str,
        date: NaiveDate,
    ) -> Result<Option<CachedEnhancement>, StoreError> {
        const OP: &str = "get_cached_enhancement";
        let row = sqlx::query(
            r#"
            SELECT id, author_name, date, commit_hashes, enhanced_text, model, created_at, updated_at
            FROM cached_enhancements
            WHERE author_name = ? AND date = ?
            "#,
        )
        .bind(author)
        .bind(format_date(date))
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::db(OP))?;

        row.map(|r| enhancement_from_row(&r, OP)).transpose()
    }

    async fn save_cached_enhancement(
        &self,
        entry: &NewCachedEnhancement,
    ) -> Result<CachedEnhancement, StoreError> {
        let now = timestamp_now().timestamp_millis();

        sqlx::query(
            r#"
            INSERT INTO cached_enhancements (id, author_name, date, commit_hashes,
                                             enhanced_text, model, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(author_name, date) DO UPDATE SET
                commit_hashes = excluded.commit_hashes,
                enhanced_text = excluded.enhanced_text,
                model = excluded.model,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&entry.author_name)
        .bind(format_date(entry.date))
        .bind(entry.commit_hashes.encode())
        .bind(&entry.enhanced_text)
        .bind(&entry.model)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::db("save_cached_enhancement"))?;

        self.get_cached_enhancement(&entry.author_name, entry.date)
            .await?
            .ok_or_else(|| StoreError::InvalidRow {
                operation: "save_cached_enhancement",
                detail: "upserted row not found".to_string(),
            })
    }

    async fn delete_cached_enhancement(
        &self,
        author: &str,
        date: NaiveDate,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM cached_enhancements WHERE author_name = ? AND date = ?")
            .bind(author)
            .bind(format_date(date))
            .execute(&self.pool)
            .await
            .map_err(StoreError::db("delete_cached_enhancement"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_cached_enhancements(
        &self,
        author: &str,
        since: NaiveDate,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM cached_enhancements WHERE author_name = ? AND date >= ?")
            .bind(author)
            .bind(format_date(since))
            .execute(&self.pool)
            .await
            .map_err(StoreError::db("delete_cached_enhancements"))?;
        Ok(result.rows_affected())
    }

    async fn record_usage(&self, entry: &UsageRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO usage_records (timestamp, model, tokens_used, duration_ms,
                                       status, error_message, author_name)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.timestamp.timestamp_millis())
        .bind(&entry.model)
        .bind(to_i64(entry.tokens_used))
        .bind(to_i64(entry.duration_ms))
        .bind(entry.status.as_str())
        .bind(&entry.error_message)
        .bind(&entry.author_name)
        .execute(&self.pool)
        .await
        .map_err(StoreError::db("record_usage"))?;
        Ok(())
    }

    async fn list_usage(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UsageRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT timestamp, model, tokens_used, duration_ms, status, error_message, author_name
            FROM usage_records
            WHERE timestamp >= ? AND timestamp < ?
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(start.timestamp_millis())
        .bind(end.timestamp_millis())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::db("list_usage"))?;

        rows.iter().map(usage_from_row).collect()
    }

    async fn get_today_usage_stats(&self, today: DayWindow) -> Result<UsageStats, StoreError> {
        const OP: &str = "get_today_usage_stats";
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS requests,
                   COALESCE(SUM(tokens_used), 0) AS tokens,
                   COALESCE(SUM(CASE WHEN status = 'error' THEN 1 ELSE 0 END), 0) AS errors,
                   COALESCE(SUM(duration_ms), 0) AS total_latency
            FROM usage_records
            WHERE timestamp >= ? AND timestamp < ?
            "#,
        )
        .bind(today.start.timestamp_millis())
        .bind(today.end.timestamp_millis())
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::db(OP))?;

        Ok(UsageStats::from_totals(
            to_u64(column(&row, "requests", OP)?),
            to_u64(column(&row, "tokens", OP)?),
            to_u64(column(&row, "errors", OP)?),
            to_u64(column(&row, "total_latency", OP)?),
        ))
    }
}
