//! Storage layer for the study time tracker.
//!
//! Provides persistence for courses, settings, and the time ledger using
//! `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization.
//!
//! # Schema
//!
//! ## Documents
//!
//! `courses` and `settings` are stored as JSON text in the `documents` table,
//! in the same shape the browser extension keeps them. Reads are lenient:
//! malformed entries inside a document are dropped, not reported.
//!
//! ## Ledger
//!
//! One row per (day, course). Additions are a single upsert
//! (`ms = ms + excluded.ms`), so concurrent writers from other processes
//! never lose an update to a stale read.

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use stt_core::{Course, CourseId, DayKey, DaySummary, Ledger, LedgerSink, Settings, parse_courses};

const COURSES_DOCUMENT: &str = "courses";
const SETTINGS_DOCUMENT: &str = "settings";

/// Adds a positive delta to a ledger cell, saturating at `i64::MAX` so the
/// column never overflows into a REAL.
const UPSERT_LEDGER_CELL: &str = "
    INSERT INTO ledger (day, course_id, ms, updated_at) VALUES (?, ?, ?, ?)
    ON CONFLICT(day, course_id) DO UPDATE SET
        ms = CASE
            WHEN ms > 9223372036854775807 - excluded.ms THEN 9223372036854775807
            ELSE ms + excluded.ms
        END,
        updated_at = excluded.updated_at
";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored document is not valid JSON, or a value could not be encoded.
    #[error("invalid {document} document: {source}")]
    Document {
        document: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// A ledger row with a day or course that fails validation.
    #[error("invalid ledger row ({day}, {course_id})")]
    InvalidLedgerRow { day: String, course_id: String },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Named JSON documents: 'courses', 'settings'
            CREATE TABLE IF NOT EXISTS documents (
                name TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- day: local calendar date 'YYYY-MM-DD'
            -- ms: accumulated milliseconds, only ever incremented
            CREATE TABLE IF NOT EXISTS ledger (
                day TEXT NOT NULL,
                course_id TEXT NOT NULL,
                ms INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (day, course_id)
            );

            CREATE INDEX IF NOT EXISTS idx_ledger_course ON ledger(course_id);
            ",
        )?;
        Ok(())
    }

    /// Writes empty courses and default settings unless already present.
    ///
    /// Returns `true` if anything was written.
    pub fn initialize_defaults(&mut self) -> Result<bool, DbError> {
        let settings = encode(SETTINGS_DOCUMENT, &Settings::default())?;
        let now = now_timestamp();
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO documents (name, body, updated_at) VALUES (?, ?, ?)",
            )?;
            written += stmt.execute(params![COURSES_DOCUMENT, "[]", now])?;
            written += stmt.execute(params![SETTINGS_DOCUMENT, settings, now])?;
        }
        tx.commit()?;
        Ok(written > 0)
    }

    /// Loads the course list. A missing document is an empty list.
    pub fn load_courses(&self) -> Result<Vec<Course>, DbError> {
        Ok(self
            .load_document(COURSES_DOCUMENT)?
            .map(|doc| parse_courses(&doc))
            .unwrap_or_default())
    }

    /// Replaces the course list.
    pub fn save_courses(&mut self, courses: &[Course]) -> Result<(), DbError> {
        let body = encode(COURSES_DOCUMENT, courses)?;
        self.save_document(COURSES_DOCUMENT, &body)
    }

    /// Loads settings. A missing or unreadable document yields defaults.
    pub fn load_settings(&self) -> Result<Settings, DbError> {
        Ok(self
            .load_document(SETTINGS_DOCUMENT)?
            .map(|doc| Settings::from_document(&doc))
            .unwrap_or_default())
    }

    pub fn save_settings(&mut self, settings: &Settings) -> Result<(), DbError> {
        let body = encode(SETTINGS_DOCUMENT, settings)?;
        self.save_document(SETTINGS_DOCUMENT, &body)
    }

    fn load_document(&self, name: &'static str) -> Result<Option<serde_json::Value>, DbError> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE name = ?",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|body| {
            serde_json::from_str(&body).map_err(|source| DbError::Document {
                document: name,
                source,
            })
        })
        .transpose()
    }

    fn save_document(&mut self, name: &str, body: &str) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO documents (name, body, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at
            ",
            params![name, body, now_timestamp()],
        )?;
        Ok(())
    }

    /// Atomically adds `ms` to the (day, course) counter.
    ///
    /// Non-positive amounts are ignored and create no row.
    pub fn add_time(&mut self, day: DayKey, course: &CourseId, ms: i64) -> Result<(), DbError> {
        if ms <= 0 {
            return Ok(());
        }
        self.conn.execute(
            UPSERT_LEDGER_CELL,
            params![day.to_string(), course.as_str(), ms, now_timestamp()],
        )?;
        tracing::debug!(%day, %course, ms, "ledger updated");
        Ok(())
    }

    /// Adds every cell of `ledger` in one transaction. Returns the cell count.
    pub fn merge_ledger(&mut self, ledger: &Ledger) -> Result<usize, DbError> {
        let now = now_timestamp();
        let tx = self.conn.transaction()?;
        let mut merged = 0;
        {
            let mut stmt = tx.prepare(UPSERT_LEDGER_CELL)?;
            for entry in ledger.entries() {
                merged += stmt.execute(params![
                    entry.day.to_string(),
                    entry.course.as_str(),
                    entry.ms,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(merged)
    }

    /// Reads the whole ledger.
    pub fn load_ledger(&self) -> Result<Ledger, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT day, course_id, ms FROM ledger ORDER BY day ASC, course_id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        let mut ledger = Ledger::new();
        for row in rows {
            let (day, course_id, ms) = row?;
            let (Ok(day_key), Ok(course)) =
                (day.parse::<DayKey>(), CourseId::new(course_id.as_str()))
            else {
                return Err(DbError::InvalidLedgerRow { day, course_id });
            };
            ledger.add(day_key, &course, ms);
        }
        Ok(ledger)
    }

    /// Total milliseconds across all courses for one day.
    ///
    /// Summed in Rust so that huge cells saturate; SQLite's `SUM` raises an
    /// overflow error instead.
    pub fn day_total(&self, day: DayKey) -> Result<i64, DbError> {
        let mut stmt = self.conn.prepare("SELECT ms FROM ledger WHERE day = ?")?;
        let mut total: i64 = 0;
        for ms in stmt.query_map(params![day.to_string()], |row| row.get::<_, i64>(0))? {
            total = total.saturating_add(ms?);
        }
        Ok(total)
    }

    /// Badge summary for one day.
    pub fn day_summary(&self, day: DayKey) -> Result<DaySummary, DbError> {
        Ok(DaySummary::new(day, self.day_total(day)?))
    }

    /// Empties the ledger. Returns the number of cells removed.
    pub fn reset_ledger(&mut self) -> Result<usize, DbError> {
        let removed = self.conn.execute("DELETE FROM ledger", [])?;
        tracing::info!(removed, "ledger reset");
        Ok(removed)
    }

    /// Counter that moves when another connection commits a change.
    ///
    /// Compare successive values to notice external edits to courses,
    /// settings, or the ledger. Writes through this connection do not move it.
    pub fn data_version(&self) -> Result<i64, DbError> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA data_version", [], |row| row.get(0))?;
        Ok(version)
    }
}

impl LedgerSink for Database {
    type Error = DbError;

    fn add_time(&mut self, day: DayKey, course: &CourseId, ms: i64) -> Result<(), DbError> {
        Self::add_time(self, day, course, ms)
    }
}

fn encode<T: serde::Serialize + ?Sized>(
    document: &'static str,
    value: &T,
) -> Result<String, DbError> {
    serde_json::to_string(value).map_err(|source| DbError::Document { document, source })
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
