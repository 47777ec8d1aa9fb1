//! Init command for creating the database and default documents.

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use stt_db::Database;

/// Runs the init command.
pub fn run<W: Write>(writer: &mut W, db: &mut Database, database_path: &Path) -> Result<()> {
    if db.initialize_defaults()? {
        writeln!(writer, "Initialized {}", database_path.display())?;
    } else {
        writeln!(writer, "Already initialized: {}", database_path.display())?;
    }
    Ok(())
}
