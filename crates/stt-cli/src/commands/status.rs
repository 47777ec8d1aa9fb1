//! Status command for showing where data lives and what is configured.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::Utc;

use stt_core::DayKey;
use stt_db::Database;

use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let timezone = iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string());
    render(writer, config, &db, &timezone, DayKey::local(Utc::now()))
}

fn render<W: Write>(
    writer: &mut W,
    config: &Config,
    db: &Database,
    timezone: &str,
    today: DayKey,
) -> Result<()> {
    let courses = db.load_courses()?;
    let settings = db.load_settings()?;
    let summary = db.day_summary(today)?;

    writeln!(writer, "Study time tracker status")?;
    writeln!(writer, "Database:       {}", config.database_path.display())?;
    writeln!(writer, "Time zone:      {timezone}")?;
    writeln!(writer, "Courses:        {}", courses.len())?;
    writeln!(
        writer,
        "Idle threshold: {}s (detection interval {}s)",
        settings.idle_threshold_sec,
        settings.idle_detection_secs()
    )?;
    writeln!(
        writer,
        "Strict folders: {}",
        if settings.strict_folder_boundaries { "on" } else { "off" }
    )?;
    writeln!(writer, "Today ({today}): {} min", summary.minutes())?;

    Ok(())
}
