//! Run command: drive the accrual engine from a stream of browser signals.
//!
//! Each input line is a JSON [`TimedSignal`]:
//!
//! ```text
//! {"at": "2025-01-15T09:00:00Z", "signal": {"type": "tab_activated", "tab_id": 1}}
//! {"signal": {"type": "idle_changed", "state": "idle"}}
//! ```
//!
//! Lines without `at` are stamped with the time they are read. Courses and
//! settings are reloaded whenever another process changes the database.
//! At end of input the open session, if any, is closed at the last signal's
//! timestamp.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};

use stt_core::{AccrualEngine, DayKey, Evaluation, FlushError, Outcome, Settings, TimedSignal};
use stt_db::{Database, DbError};

/// Counters reported when the input ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub processed: usize,
    pub skipped: usize,
    pub failed_writes: usize,
    pub reloads: usize,
    pub failed_reloads: usize,
}

pub fn run<R: BufRead, W: Write>(
    mut reader: R,
    writer: &mut W,
    db: &mut Database,
) -> Result<RunStats> {
    let settings = db.load_settings()?;
    let engine = AccrualEngine::new(db.load_courses()?, settings.match_options());
    let mut replay = Replay::start(db, engine, &settings)?;

    let mut buf = Vec::new();
    let mut line_no = 0;
    let read_error = loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break None,
            Ok(_) => {
                line_no += 1;
                replay.feed_bytes(db, line_no, &buf);
            }
            Err(e) => break Some(e),
        }
    };
    let stats = replay.finish(db);

    writeln!(
        writer,
        "Processed {} signals ({} skipped, {} failed writes)",
        stats.processed, stats.skipped, stats.failed_writes
    )?;
    if let Some(e) = read_error {
        return Err(e).with_context(|| format!("failed to read line {}", line_no + 1));
    }
    Ok(stats)
}

/// Engine plus the bookkeeping needed to replay a signal stream against a
/// database that other processes may edit.
///
/// Nothing past [`Replay::start`] fails: bad input and storage errors are
/// logged and counted so the open session always reaches [`Replay::finish`].
struct Replay<Tz: TimeZone> {
    engine: AccrualEngine<Tz>,
    version: i64,
    last_at: Option<DateTime<Utc>>,
    stats: RunStats,
}

impl<Tz: TimeZone> Replay<Tz> {
    fn start(db: &Database, engine: AccrualEngine<Tz>, settings: &Settings) -> Result<Self> {
        announce_settings(settings);
        Ok(Self {
            engine,
            version: db.data_version()?,
            last_at: None,
            stats: RunStats::default(),
        })
    }

    fn feed_bytes(&mut self, db: &mut Database, line_no: usize, bytes: &[u8]) {
        match std::str::from_utf8(bytes) {
            Ok(line) => self.feed(db, line_no, line),
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "skipping undecodable signal");
                self.stats.skipped += 1;
            }
        }
    }

    fn feed(&mut self, db: &mut Database, line_no: usize, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }
        let timed: TimedSignal = match serde_json::from_str(trimmed) {
            Ok(timed) => timed,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "skipping malformed signal");
                self.stats.skipped += 1;
                return;
            }
        };

        let now = timed.at.unwrap_or_else(Utc::now);
        self.check_for_changes(db, now);

        self.last_at = timed.at;
        self.stats.processed += 1;
        match self.engine.handle(timed.signal, now, &mut *db) {
            Ok(outcome) => log_outcome(&outcome),
            Err(err) => self.record_failed_flush(&err),
        }
    }

    /// Reloads courses and settings if another connection committed.
    ///
    /// A failed reload keeps the current rules; the version is still
    /// advanced so the same bad document is not re-read on every signal.
    fn check_for_changes(&mut self, db: &mut Database, now: DateTime<Utc>) {
        let current = match db.data_version() {
            Ok(current) => current,
            Err(e) => {
                tracing::error!(error = %e, "could not check for configuration changes");
                return;
            }
        };
        if self.version == current {
            return;
        }
        self.version = current;
        if let Err(e) = reload(db, &mut self.engine) {
            tracing::error!(error = %e, "reload failed, keeping previous courses and settings");
            self.stats.failed_reloads += 1;
            return;
        }
        self.stats.reloads += 1;
        // The new rules may move or end the open session before this signal.
        match self.engine.reevaluate(now, &mut *db) {
            Ok(outcome) => log_outcome(&outcome),
            Err(err) => self.record_failed_flush(&err),
        }
    }

    fn record_failed_flush(&mut self, err: &FlushError<DbError>) {
        tracing::error!(
            error = %err,
            source = %err.source,
            "time slice was not recorded"
        );
        self.stats.failed_writes += 1;
    }

    /// Closes the open session at the last explicit timestamp, or now.
    fn finish(mut self, db: &mut Database) -> RunStats {
        let end = self.last_at.unwrap_or_else(Utc::now);
        if let Err(err) = self.engine.shutdown(end, &mut *db) {
            self.record_failed_flush(&err);
        }
        self.stats
    }
}

/// Picks up course and settings edits made by another process.
fn reload<Tz: TimeZone>(db: &Database, engine: &mut AccrualEngine<Tz>) -> Result<(), DbError> {
    let courses = db.load_courses()?;
    let settings = db.load_settings()?;
    tracing::info!(courses = courses.len(), "configuration changed, reloading");
    engine.set_courses(courses);
    engine.set_match_options(settings.match_options());
    announce_settings(&settings);

    match db.day_summary(DayKey::local(Utc::now())) {
        Ok(today) => tracing::info!(
            day = %today.day,
            minutes = today.minutes(),
            badge = %today.badge_text(),
            "today's total"
        ),
        Err(e) => tracing::warn!(error = %e, "could not read today's total"),
    }
    Ok(())
}

fn announce_settings(settings: &Settings) {
    tracing::info!(
        idle_detection_secs = settings.idle_detection_secs(),
        strict_folder_boundaries = settings.strict_folder_boundaries,
        "tracker settings"
    );
}

fn log_outcome(outcome: &Outcome) {
    if let Some(slice) = &outcome.flushed {
        tracing::debug!(
            course = %slice.course,
            day = %slice.day,
            duration_ms = slice.duration_ms,
            "slice recorded"
        );
    }
    match &outcome.evaluation {
        Evaluation::Started(course) => tracing::debug!(%course, "now tracking"),
        Evaluation::Continued(course) => tracing::trace!(%course, "still tracking"),
        other => tracing::trace!(?other, "evaluation"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    use stt_core::{Course, CourseId, FolderRule};

    fn econ_db() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        db.save_courses(&[
            Course::new("ECON101").with_site("https://lms.example.edu/course/ECON101"),
            Course::new("NOTES").with_folder(FolderRule::recursive("/Users/a/School/ECON101")),
        ])
        .unwrap();
        db
    }

    fn start_utc(db: &Database) -> Replay<Utc> {
        let settings = db.load_settings().unwrap();
        let engine = AccrualEngine::with_timezone(
            Utc,
            db.load_courses().unwrap(),
            settings.match_options(),
        );
        Replay::start(db, engine, &settings).unwrap()
    }

    fn replay(db: &mut Database, input: &str) -> RunStats {
        let mut replay = start_utc(db);
        feed_all(&mut replay, db, input);
        replay.finish(db)
    }

    fn feed_all<Tz: TimeZone>(replay: &mut Replay<Tz>, db: &mut Database, input: &str) {
        for (idx, line) in input.lines().enumerate() {
            replay.feed(db, idx + 1, line);
        }
    }

    fn ms(db: &Database, day: &str, course: &str) -> i64 {
        db.load_ledger()
            .unwrap()
            .get(day.parse().unwrap(), &CourseId::new(course).unwrap())
    }

    const OPEN_ECON: &str = r#"
{"at": "2025-01-15T09:00:00Z", "signal": {"type": "tab_activated", "tab_id": 1}}
{"at": "2025-01-15T09:00:00Z", "signal": {"type": "visibility_changed", "tab_id": 1, "visible": true}}
{"at": "2025-01-15T09:00:00Z", "signal": {"type": "tab_navigated", "tab_id": 1, "url": "https://lms.example.edu/course/ECON101"}}
"#;

    #[test]
    fn replay_accrues_until_unrelated_page() {
        let mut db = econ_db();
        let input = format!(
            "{OPEN_ECON}{}\n",
            r#"{"at": "2025-01-15T09:05:00Z", "signal": {"type": "tab_navigated", "tab_id": 1, "url": "https://news.example.com"}}"#
        );
        let stats = replay(&mut db, &input);
        assert_eq!(stats.processed, 4);
        assert_eq!(ms(&db, "2025-01-15", "ECON101"), 300_000);
    }

    #[test]
    fn end_of_input_flushes_at_last_timestamp() {
        let mut db = econ_db();
        let input = format!(
            "{OPEN_ECON}{}\n",
            r#"{"at": "2025-01-15T09:01:30Z", "signal": {"type": "window_focus_changed", "focused": true}}"#
        );
        replay(&mut db, &input);
        assert_eq!(ms(&db, "2025-01-15", "ECON101"), 90_000);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let mut db = econ_db();
        let input = format!(
            "{OPEN_ECON}not json\n{}\n{}\n",
            r#"{"signal": {"type": "teleported"}}"#,
            r#"{"at": "2025-01-15T09:02:00Z", "signal": {"type": "idle_changed", "state": "idle"}}"#
        );
        let stats = replay(&mut db, &input);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.processed, 4);
        assert_eq!(ms(&db, "2025-01-15", "ECON101"), 120_000);
    }

    #[test]
    fn run_reports_counts() {
        let mut db = econ_db();
        let mut output = Vec::new();
        let stats = run(Cursor::new("garbage\n"), &mut output, &mut db).unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Processed 0 signals (1 skipped, 0 failed writes)\n"
        );
    }

    #[test]
    fn course_edits_from_another_connection_are_picked_up() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("stt.db");
        let mut db = Database::open(&path).unwrap();
        let mut editor = Database::open(&path).unwrap();

        let settings = db.load_settings().unwrap();
        let engine = AccrualEngine::with_timezone(Utc, Vec::new(), settings.match_options());
        let mut replay = Replay::start(&db, engine, &settings).unwrap();
        feed_all(&mut replay, &mut db, OPEN_ECON);
        assert_eq!(replay.stats.reloads, 0);
        assert!(replay.engine.tracking().is_none());

        editor
            .save_courses(&[Course::new("ECON101").with_site("https://lms.example.edu/")])
            .unwrap();

        feed_all(
            &mut replay,
            &mut db,
            r#"{"at": "2025-01-15T09:10:00Z", "signal": {"type": "window_focus_changed", "focused": true}}
{"at": "2025-01-15T09:11:00Z", "signal": {"type": "window_focus_changed", "focused": false}}"#,
        );
        let stats = replay.finish(&mut db);
        assert_eq!(stats.reloads, 1);
        assert_eq!(ms(&db, "2025-01-15", "ECON101"), 60_000);
    }

    /// A database file plus a raw connection for editing it behind the
    /// tracker's back.
    fn shared_db(temp: &tempfile::TempDir) -> (Database, rusqlite::Connection) {
        let path = temp.path().join("stt.db");
        let mut db = Database::open(&path).unwrap();
        db.save_courses(&[
            Course::new("ECON101").with_site("https://lms.example.edu/course/ECON101"),
        ])
        .unwrap();
        let raw = rusqlite::Connection::open(&path).unwrap();
        (db, raw)
    }

    fn total_ms(db: &Database) -> i64 {
        db.load_ledger().unwrap().entries().map(|entry| entry.ms).sum()
    }

    #[test]
    fn undecodable_line_is_skipped_mid_session() {
        let mut db = econ_db();
        let mut input = OPEN_ECON.as_bytes().to_vec();
        input.extend_from_slice(b"\xff\xfe garbage\n");
        input.extend_from_slice(
            br#"{"at": "2025-01-15T09:05:00Z", "signal": {"type": "window_focus_changed", "focused": false}}"#,
        );
        input.push(b'\n');

        let mut output = Vec::new();
        let stats = run(Cursor::new(input), &mut output, &mut db).unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.processed, 4);
        assert_eq!(total_ms(&db), 300_000);
    }

    #[test]
    fn last_line_without_newline_is_processed() {
        let mut db = econ_db();
        let input = format!(
            "{OPEN_ECON}{}",
            r#"{"at": "2025-01-15T09:03:00Z", "signal": {"type": "idle_changed", "state": "locked"}}"#
        );
        let mut output = Vec::new();
        let stats = run(Cursor::new(input), &mut output, &mut db).unwrap();
        assert_eq!(stats.processed, 4);
        assert_eq!(total_ms(&db), 180_000);
    }

    #[test]
    fn corrupted_courses_document_keeps_previous_rules() {
        let temp = tempfile::tempdir().unwrap();
        let (mut db, raw) = shared_db(&temp);
        let mut replay = start_utc(&db);
        feed_all(&mut replay, &mut db, OPEN_ECON);
        assert!(replay.engine.tracking().is_some());

        raw.execute("UPDATE documents SET body = '{oops' WHERE name = 'courses'", [])
            .unwrap();

        feed_all(
            &mut replay,
            &mut db,
            r#"{"at": "2025-01-15T09:05:00Z", "signal": {"type": "window_focus_changed", "focused": false}}
{"at": "2025-01-15T09:06:00Z", "signal": {"type": "window_focus_changed", "focused": true}}"#,
        );
        assert_eq!(replay.stats.failed_reloads, 1);
        assert_eq!(replay.stats.processed, 5);
        assert!(replay.engine.tracking().is_some());

        let stats = replay.finish(&mut db);
        assert_eq!(stats.failed_writes, 0);
        assert_eq!(total_ms(&db), 300_000);
    }

    #[test]
    fn failed_final_flush_is_counted() {
        let temp = tempfile::tempdir().unwrap();
        let (mut db, raw) = shared_db(&temp);
        let mut replay = start_utc(&db);
        feed_all(
            &mut replay,
            &mut db,
            &format!(
                "{OPEN_ECON}{}",
                r#"{"at": "2025-01-15T09:02:00Z", "signal": {"type": "idle_changed", "state": "active"}}"#
            ),
        );
        assert!(replay.engine.tracking().is_some());

        raw.execute_batch("DROP TABLE ledger").unwrap();

        let stats = replay.finish(&mut db);
        assert_eq!(stats.failed_writes, 1);
        assert_eq!(stats.processed, 4);
    }

    #[test]
    fn failed_write_does_not_stop_later_signals() {
        let temp = tempfile::tempdir().unwrap();
        let (mut db, raw) = shared_db(&temp);
        let mut replay = start_utc(&db);
        feed_all(&mut replay, &mut db, OPEN_ECON);

        raw.execute_batch("DROP TABLE ledger").unwrap();
        feed_all(
            &mut replay,
            &mut db,
            r#"{"at": "2025-01-15T09:05:00Z", "signal": {"type": "tab_navigated", "tab_id": 1, "url": "https://news.example.com"}}
{"at": "2025-01-15T09:06:00Z", "signal": {"type": "tab_navigated", "tab_id": 1, "url": "https://lms.example.edu/course/ECON101/week2"}}"#,
        );
        assert_eq!(replay.stats.failed_writes, 1);
        assert_eq!(replay.stats.processed, 5);
        assert!(replay.engine.tracking().is_some());
    }
}
