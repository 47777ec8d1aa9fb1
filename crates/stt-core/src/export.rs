//! Flat CSV export of the ledger.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::course::Course;
use crate::ledger::Ledger;

/// File name offered for the download.
pub const EXPORT_FILENAME: &str = "study-time-tracker-export.csv";

/// MIME type of the export document.
pub const EXPORT_MIME: &str = "text/csv";

const HEADER: [&str; 3] = ["date", "course", "minutes"];

/// Export formatting errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush csv writer: {0}")]
    Flush(String),
    #[error("export is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// One exported (day, course) row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub date: String,
    /// Course name, or its id when the course is unknown or unnamed.
    pub course: String,
    /// Minutes with two decimals.
    pub minutes: String,
}

impl ExportRow {
    fn fields(&self) -> [&str; 3] {
        [&self.date, &self.course, &self.minutes]
    }
}

/// A ready-to-download export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportDocument {
    pub mime: &'static str,
    pub filename: &'static str,
    pub content: String,
}

/// Builds one row per ledger cell, ordered by day then course id.
pub fn build_rows(ledger: &Ledger, courses: &[Course]) -> Vec<ExportRow> {
    let names: HashMap<String, &str> = courses
        .iter()
        .filter_map(|course| Some((course.key()?.into(), course.display_name()?)))
        .collect();

    ledger
        .entries()
        .map(|entry| ExportRow {
            date: entry.day.to_string(),
            course: names
                .get(entry.course.as_str())
                .map_or_else(|| entry.course.to_string(), |name| (*name).to_string()),
            minutes: format_minutes(entry.ms),
        })
        .collect()
}

/// Renders rows as CSV: a header, every field quoted, `\n` between rows.
pub fn to_csv(rows: &[ExportRow]) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(HEADER)?;
    for row in rows {
        writer.write_record(row.fields())?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Flush(err.error().to_string()))?;
    let mut content = String::from_utf8(bytes)?;
    // Rows are joined, not terminated.
    if content.ends_with('\n') {
        content.pop();
    }
    Ok(content)
}

/// Builds the full export document for the ledger.
pub fn export_document(ledger: &Ledger, courses: &[Course]) -> Result<ExportDocument, ExportError> {
    let content = to_csv(&build_rows(ledger, courses))?;
    Ok(ExportDocument {
        mime: EXPORT_MIME,
        filename: EXPORT_FILENAME,
        content,
    })
}

/// Milliseconds as minutes with two decimals, rounding half up.
pub fn format_minutes(ms: i64) -> String {
    let hundredths = ms.max(0).saturating_add(300) / 600;
    format!("{}.{:02}", hundredths / 100, hundredths % 100)
}
