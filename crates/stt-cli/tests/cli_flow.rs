//! End-to-end tests driving the `stt` binary.
//!
//! Tests the full pipeline: init → courses import → run → export/today.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn stt_binary() -> String {
    env!("CARGO_BIN_EXE_stt").to_string()
}

/// Runs `stt` with all state confined to `home` and days bucketed in UTC.
fn stt(home: &Path, args: &[&str]) -> Output {
    Command::new(stt_binary())
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("XDG_DATA_HOME", home.join(".local/share"))
        .env("STT_DATABASE_PATH", home.join("stt.db"))
        .env("TZ", "UTC")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to run stt")
}

fn stdout_of(output: &Output) -> String {
    assert!(
        output.status.success(),
        "stt should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

const COURSES: &str = r##"[
  {"id": "ECON101", "name": "Intro to Economics", "color": "#ef4444",
   "sites": [{"pattern": "https://lms.example.edu/course/ECON101"}],
   "folders": [{"path": "/Users/a/School/ECON101", "includeSubfolders": true}]},
  {"id": "BIO200", "sites": [{"pattern": "https://bio.example.edu"}]}
]"##;

const SIGNALS: &str = r#"{"at": "2025-01-15T09:00:00Z", "signal": {"type": "tab_activated", "tab_id": 1, "url": "https://lms.example.edu/course/ECON101/week1"}}
{"at": "2025-01-15T09:00:00Z", "signal": {"type": "visibility_changed", "tab_id": 1, "visible": true}}
{"at": "2025-01-15T09:05:00Z", "signal": {"type": "tab_navigated", "tab_id": 1, "url": "https://BIO.example.edu/lab"}}
{"at": "2025-01-15T09:08:00Z", "signal": {"type": "idle_changed", "state": "idle"}}
{"at": "2025-01-15T09:20:00Z", "signal": {"type": "idle_changed", "state": "active"}}
{"at": "2025-01-15T09:21:30Z", "signal": {"type": "tab_navigated", "tab_id": 1, "url": "file:///Users/a/School/ECON101/notes/ch%201.pdf"}}
{"at": "2025-01-15T09:24:30Z", "signal": {"type": "window_focus_changed", "focused": false}}
"#;

fn seeded(temp: &TempDir) {
    let home = temp.path();
    stdout_of(&stt(home, &["init"]));

    let courses = home.join("courses.json");
    std::fs::write(&courses, COURSES).unwrap();
    let imported = stdout_of(&stt(home, &["courses", "import", courses.to_str().unwrap()]));
    assert_eq!(imported.trim(), "Imported 2 course(s).");
}

#[test]
fn test_run_then_export() {
    let temp = TempDir::new().unwrap();
    seeded(&temp);
    let home = temp.path();

    let signals = home.join("signals.jsonl");
    std::fs::write(&signals, SIGNALS).unwrap();
    let summary = stdout_of(&stt(home, &["run", "--input", signals.to_str().unwrap()]));
    assert_eq!(
        summary.trim(),
        "Processed 7 signals (0 skipped, 0 failed writes)"
    );

    // ECON101: 5 min on the site + 3 min in the notes folder; BIO200: 3 min
    // before going idle, 1.5 min after coming back.
    let csv = stdout_of(&stt(home, &["export"]));
    assert_eq!(
        csv.trim_end(),
        "\"date\",\"course\",\"minutes\"\n\
         \"2025-01-15\",\"BIO200\",\"4.50\"\n\
         \"2025-01-15\",\"Intro to Economics\",\"8.00\""
    );
}

#[test]
fn test_export_to_directory_uses_default_filename() {
    let temp = TempDir::new().unwrap();
    seeded(&temp);
    let home = temp.path();

    let out_dir = home.join("downloads");
    std::fs::create_dir_all(&out_dir).unwrap();
    stdout_of(&stt(home, &["export", "--output", out_dir.to_str().unwrap()]));

    let written = std::fs::read_to_string(out_dir.join("study-time-tracker-export.csv")).unwrap();
    assert_eq!(written, "\"date\",\"course\",\"minutes\"");
}

#[test]
fn test_courses_resolve() {
    let temp = TempDir::new().unwrap();
    seeded(&temp);
    let home = temp.path();

    let hit = stdout_of(&stt(
        home,
        &["courses", "resolve", "file:///Users/a/School/ECON101/hw/set2.html"],
    ));
    assert_eq!(hit.trim(), "ECON101");

    let miss = stdout_of(&stt(home, &["courses", "resolve", "https://news.example.com"]));
    assert_eq!(miss.trim(), "no match");
}

#[test]
fn test_import_storage_dump_merges_log() {
    let temp = TempDir::new().unwrap();
    seeded(&temp);
    let home = temp.path();

    let dump = home.join("dump.json");
    std::fs::write(
        &dump,
        r#"{"log": {"2025-01-14": {"BIO200": 90000}}, "settings": {"idleThresholdSec": 120}}"#,
    )
    .unwrap();

    for _ in 0..2 {
        stdout_of(&stt(home, &["import", dump.to_str().unwrap()]));
    }

    let csv = stdout_of(&stt(home, &["export"]));
    assert!(csv.contains("\"2025-01-14\",\"BIO200\",\"3.00\""), "got: {csv}");

    let settings = stdout_of(&stt(home, &["settings", "show"]));
    assert!(settings.starts_with("Idle threshold: 120s"), "got: {settings}");

    // Courses were absent from the dump, so they survive.
    let listed = stdout_of(&stt(home, &["courses", "list"]));
    assert_eq!(listed.lines().count(), 2);
}

#[test]
fn test_reset_requires_confirmation() {
    let temp = TempDir::new().unwrap();
    seeded(&temp);
    let home = temp.path();

    let refused = stt(home, &["reset"]);
    assert!(!refused.status.success());

    let done = stdout_of(&stt(home, &["reset", "--yes"]));
    assert_eq!(done.trim(), "Removed 0 ledger entries.");
}
