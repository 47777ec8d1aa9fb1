//! Implementation of the `stt export` command.
//!
//! Writes the whole ledger as CSV, either to stdout or to a file. A directory
//! given as the output receives the export under its default file name.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use stt_core::export_document;
use stt_db::Database;

/// Builds the CSV export from the database.
pub fn render(db: &Database) -> Result<String> {
    let ledger = db.load_ledger()?;
    let courses = db.load_courses()?;
    let document = export_document(&ledger, &courses).context("failed to build export")?;
    Ok(document.content)
}

/// Writes the export to `writer`.
pub fn run<W: Write>(writer: &mut W, db: &Database) -> Result<()> {
    let content = render(db)?;
    writeln!(writer, "{content}")?;
    Ok(())
}

/// Writes the export to `output`, returning the file actually written.
pub fn run_to_path(db: &Database, output: &Path) -> Result<PathBuf> {
    let path = if output.is_dir() {
        output.join(stt_core::export::EXPORT_FILENAME)
    } else {
        output.to_path_buf()
    };
    let content = render(db)?;
    std::fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "export written");
    Ok(path)
}
