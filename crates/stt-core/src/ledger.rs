//! The per-day, per-course time ledger.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CourseId, ValidationError};

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Badge text never shows more than three digits.
const BADGE_MAX_MINUTES: i64 = 999;

/// A local calendar date used to bucket ledger entries (`YYYY-MM-DD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayKey(NaiveDate);

impl DayKey {
    /// The calendar date of `instant` in the given time zone.
    pub fn for_instant<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> Self {
        Self(instant.with_timezone(tz).date_naive())
    }

    /// The calendar date of `instant` in the machine's local time zone.
    pub fn local(instant: DateTime<Utc>) -> Self {
        Self::for_instant(instant, &Local)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_KEY_FORMAT))
    }
}

impl FromStr for DayKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, DAY_KEY_FORMAT)
            .map(Self)
            .map_err(|_| ValidationError::InvalidDayKey {
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for DayKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DayKey> for String {
    fn from(day: DayKey) -> Self {
        day.to_string()
    }
}

/// Destination for completed tracking slices.
///
/// Implementations must apply each addition atomically: two writers adding
/// to the same (day, course) must never lose either delta.
pub trait LedgerSink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Adds `ms` milliseconds to the (day, course) counter, creating it if needed.
    fn add_time(&mut self, day: DayKey, course: &CourseId, ms: i64) -> Result<(), Self::Error>;
}

/// In-memory ledger: day → course → accumulated milliseconds.
///
/// Serializes to the extension's `log` document shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    days: BTreeMap<DayKey, BTreeMap<CourseId, i64>>,
}

/// One (day, course) ledger cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub day: DayKey,
    pub course: CourseId,
    pub ms: i64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds time to a cell. Non-positive amounts are ignored; totals
    /// saturate at `i64::MAX`.
    pub fn add(&mut self, day: DayKey, course: &CourseId, ms: i64) {
        if ms <= 0 {
            return;
        }
        let cell = self
            .days
            .entry(day)
            .or_default()
            .entry(course.clone())
            .or_insert(0);
        *cell = cell.saturating_add(ms);
    }

    /// Milliseconds recorded for one course on one day.
    pub fn get(&self, day: DayKey, course: &CourseId) -> i64 {
        self.days
            .get(&day)
            .and_then(|courses| courses.get(course))
            .copied()
            .unwrap_or(0)
    }

    /// Per-course totals for one day.
    pub fn day(&self, day: DayKey) -> Option<&BTreeMap<CourseId, i64>> {
        self.days.get(&day)
    }

    /// Total milliseconds across all courses for one day.
    pub fn day_total(&self, day: DayKey) -> i64 {
        self.days
            .get(&day)
            .map_or(0, |courses| {
                courses.values().fold(0_i64, |total, ms| total.saturating_add(*ms))
            })
    }

    /// All cells, ordered by day then course.
    pub fn entries(&self) -> impl Iterator<Item = LedgerEntry> + '_ {
        self.days.iter().flat_map(|(day, courses)| {
            courses.iter().map(|(course, ms)| LedgerEntry {
                day: *day,
                course: course.clone(),
                ms: *ms,
            })
        })
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Parses a stored `log` document, dropping cells with bad keys or values.
    pub fn from_document(value: &serde_json::Value) -> Self {
        let mut ledger = Self::new();
        let Some(days) = value.as_object() else {
            return ledger;
        };
        for (day, courses) in days {
            let Ok(day_key) = day.parse::<DayKey>() else {
                tracing::warn!(day, "skipping ledger day with invalid key");
                continue;
            };
            let Some(courses) = courses.as_object() else {
                continue;
            };
            for (course, ms) in courses {
                let (Ok(course_id), Some(ms)) = (CourseId::new(course.as_str()), as_millis(ms))
                else {
                    tracing::warn!(day, course, "skipping malformed ledger cell");
                    continue;
                };
                ledger.add(day_key, &course_id, ms);
            }
        }
        ledger
    }
}

/// The extension stores milliseconds as JS numbers, which may be floats.
///
/// Floats outside the `i64` range are rejected rather than saturated.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    reason = "range is checked before the cast"
)]
fn as_millis(value: &serde_json::Value) -> Option<i64> {
    if let Some(ms) = value.as_i64() {
        return Some(ms);
    }
    let ms = value.as_f64()?.round();
    (ms.is_finite() && ms >= i64::MIN as f64 && ms < i64::MAX as f64).then_some(ms as i64)
}

impl LedgerSink for Ledger {
    type Error = Infallible;

    fn add_time(&mut self, day: DayKey, course: &CourseId, ms: i64) -> Result<(), Self::Error> {
        self.add(day, course, ms);
        Ok(())
    }
}

/// Today's total across all courses, as shown on the toolbar badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub day: DayKey,
    pub total_ms: i64,
}

impl DaySummary {
    pub const fn new(day: DayKey, total_ms: i64) -> Self {
        Self { day, total_ms }
    }

    /// Whole minutes, rounded down.
    pub const fn minutes(&self) -> i64 {
        self.total_ms / 60_000
    }

    /// Badge label: empty below one minute, capped at 999.
    pub fn badge_text(&self) -> String {
        let minutes = self.minutes();
        if minutes > 0 {
            minutes.min(BADGE_MAX_MINUTES).to_string()
        } else {
            String::new()
        }
    }
}
