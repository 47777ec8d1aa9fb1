//! Today command: the toolbar badge total and a per-course breakdown.

use std::collections::HashMap;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use stt_core::{Course, CourseId, DayKey, DaySummary, Ledger};
use stt_db::Database;

/// How to print the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Badge,
    Json,
}

/// Time recorded today for one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct CourseTime {
    id: CourseId,
    name: String,
    ms: i64,
    minutes: i64,
}

pub fn run<W: Write>(writer: &mut W, db: &Database, format: Format) -> Result<()> {
    let day = DayKey::local(Utc::now());
    let ledger = db.load_ledger()?;
    let courses = db.load_courses()?;
    let summary = DaySummary::new(day, ledger.day_total(day));
    write_summary(writer, &summary, &breakdown(&ledger, &courses, day), format)
}

/// Today's cells, largest first, labelled with course names where known.
fn breakdown(ledger: &Ledger, courses: &[Course], day: DayKey) -> Vec<CourseTime> {
    let names: HashMap<CourseId, &str> = courses
        .iter()
        .filter_map(|course| Some((course.key()?, course.display_name()?)))
        .collect();

    let mut rows: Vec<CourseTime> = ledger
        .day(day)
        .into_iter()
        .flatten()
        .map(|(id, ms)| CourseTime {
            name: names
                .get(id)
                .map_or_else(|| id.to_string(), |name| (*name).to_string()),
            id: id.clone(),
            ms: *ms,
            minutes: *ms / 60_000,
        })
        .collect();
    rows.sort_by(|a, b| b.ms.cmp(&a.ms).then_with(|| a.id.cmp(&b.id)));
    rows
}

fn write_summary<W: Write>(
    writer: &mut W,
    summary: &DaySummary,
    courses: &[CourseTime],
    format: Format,
) -> Result<()> {
    match format {
        Format::Text => {
            writeln!(writer, "Today ({}): {} min", summary.day, summary.minutes())?;
            for course in courses {
                writeln!(writer, "  {:<24} {} min", course.name, course.minutes)?;
            }
        }
        Format::Badge => writeln!(writer, "{}", summary.badge_text())?,
        Format::Json => {
            let value = serde_json::json!({
                "day": summary.day,
                "total_ms": summary.total_ms,
                "minutes": summary.minutes(),
                "badge": summary.badge_text(),
                "courses": courses,
            });
            serde_json::to_writer(&mut *writer, &value).context("failed to serialize summary")?;
            writeln!(writer)?;
        }
    }
    Ok(())
}
