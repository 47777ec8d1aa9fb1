//! Import command for loading a browser extension storage dump.
//!
//! The dump is the extension's whole local storage: `courses`, `log`, and
//! `settings`. Courses and settings replace what is stored; the log is added
//! to the ledger, since ledger cells only ever grow.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use stt_core::{Ledger, Settings, parse_courses};
use stt_db::Database;

/// What an import changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub courses: Option<usize>,
    pub settings: bool,
    pub ledger_cells: usize,
}

#[derive(Debug, Default, Deserialize)]
struct StorageDump {
    #[serde(default)]
    courses: Option<serde_json::Value>,
    #[serde(default)]
    log: Option<serde_json::Value>,
    #[serde(default)]
    settings: Option<serde_json::Value>,
}

pub fn run(db: &mut Database, path: &Path) -> Result<ImportSummary> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let dump: StorageDump = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a storage dump", path.display()))?;
    apply(db, dump)
}

fn apply(db: &mut Database, dump: StorageDump) -> Result<ImportSummary> {
    let courses = match dump.courses {
        Some(value) => {
            let courses = parse_courses(&value);
            db.save_courses(&courses)?;
            Some(courses.len())
        }
        None => None,
    };

    let settings = match dump.settings {
        Some(value) => {
            db.save_settings(&Settings::from_document(&value))?;
            true
        }
        None => false,
    };

    let ledger_cells = match dump.log {
        Some(value) => db.merge_ledger(&Ledger::from_document(&value))?,
        None => 0,
    };

    tracing::info!(?courses, settings, ledger_cells, "storage dump imported");
    Ok(ImportSummary {
        courses,
        settings,
        ledger_cells,
    })
}
