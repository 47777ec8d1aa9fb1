//! Settings command for the idle threshold and folder matching mode.

use std::io::Write;

use anyhow::Result;

use stt_core::Settings;
use stt_core::settings::{MAX_IDLE_DETECTION_SECS, MIN_IDLE_DETECTION_SECS};
use stt_db::Database;

pub fn show<W: Write>(writer: &mut W, db: &Database) -> Result<()> {
    let settings = db.load_settings()?;
    write_settings(writer, &settings)
}

/// Stores a new idle threshold. Out-of-range values are kept as given and
/// clamped when handed to the idle detector.
pub fn set_idle<W: Write>(writer: &mut W, db: &mut Database, seconds: u32) -> Result<()> {
    let mut settings = db.load_settings()?;
    settings.idle_threshold_sec = seconds;
    db.save_settings(&settings)?;
    if settings.idle_detection_secs() != seconds {
        tracing::warn!(
            seconds,
            min = MIN_IDLE_DETECTION_SECS,
            max = MAX_IDLE_DETECTION_SECS,
            "idle threshold outside supported range, detector will clamp it"
        );
    }
    write_settings(writer, &settings)
}

pub fn set_strict_folders<W: Write>(
    writer: &mut W,
    db: &mut Database,
    enabled: bool,
) -> Result<()> {
    let mut settings = db.load_settings()?;
    settings.strict_folder_boundaries = enabled;
    db.save_settings(&settings)?;
    write_settings(writer, &settings)
}

fn write_settings<W: Write>(writer: &mut W, settings: &Settings) -> Result<()> {
    writeln!(
        writer,
        "Idle threshold: {}s (detection interval {}s)",
        settings.idle_threshold_sec,
        settings.idle_detection_secs()
    )?;
    writeln!(
        writer,
        "Strict folder boundaries: {}",
        settings.strict_folder_boundaries
    )?;
    Ok(())
}
