//! Course list management: list, import, and resolve.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use stt_core::{parse_courses, resolve_course};
use stt_db::Database;

/// Lists configured courses.
pub fn list<W: Write>(writer: &mut W, db: &Database, json: bool) -> Result<()> {
    let courses = db.load_courses()?;
    if json {
        serde_json::to_writer_pretty(&mut *writer, &courses)
            .context("failed to serialize courses")?;
        writeln!(writer)?;
        return Ok(());
    }

    if courses.is_empty() {
        writeln!(writer, "No courses configured.")?;
        return Ok(());
    }

    for course in &courses {
        let key = course
            .key()
            .map_or_else(|| "(no id)".to_string(), String::from);
        let name = course.display_name().unwrap_or("-");
        writeln!(
            writer,
            "{key:<12} {name:<24} {color}  {sites} site(s), {folders} folder rule(s)",
            color = course.color,
            sites = course.sites.len(),
            folders = course.folders.len(),
        )?;
    }
    Ok(())
}

/// Replaces the course list with a JSON array read from `path`.
///
/// Returns the number of courses stored.
pub fn import(db: &mut Database, path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("invalid JSON in {}", path.display()))?;
    if !value.is_array() {
        anyhow::bail!("{} must contain a JSON array of courses", path.display());
    }
    let courses = parse_courses(&value);
    let unusable = courses.iter().filter(|c| c.key().is_none()).count();
    if unusable > 0 {
        tracing::warn!(unusable, "courses without id or name will never match");
    }
    db.save_courses(&courses)?;
    Ok(courses.len())
}

/// Prints the course `url` resolves to under the stored settings.
pub fn resolve<W: Write>(writer: &mut W, db: &Database, url: &str) -> Result<()> {
    let courses = db.load_courses()?;
    let settings = db.load_settings()?;
    let resolved = resolve_course(url, &courses, settings.match_options());
    writeln!(
        writer,
        "{}",
        resolved.map_or_else(|| "no match".to_string(), String::from)
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use stt_core::{Course, FolderRule};

    fn sample_courses() -> Vec<Course> {
        vec![
            Course::new("ECON101")
                .named("Econ 101")
                .with_site("https://lms.example.edu/course/ECON101")
                .with_folder(FolderRule::recursive("/Users/a/School/ECON101")),
            Course::new("HIST200").with_site("https://lms.example.edu/course/HIST200"),
        ]
    }

    #[test]
    fn list_outputs_one_line_per_course() {
        let mut db = Database::open_in_memory().unwrap();
        db.save_courses(&sample_courses()).unwrap();

        let mut output = Vec::new();
        list(&mut output, &db, false).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap());
    }

    #[test]
    fn list_reports_empty_configuration() {
        let db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        list(&mut output, &db, false).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "No courses configured.\n");
    }

    #[test]
    fn import_replaces_course_list() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("courses.json");
        std::fs::write(
            &path,
            r#"[{"id": "BIO", "sites": [{"pattern": "https://bio.example.edu"}]}, 12]"#,
        )
        .unwrap();

        let mut db = Database::open_in_memory().unwrap();
        db.save_courses(&sample_courses()).unwrap();
        assert_eq!(import(&mut db, &path).unwrap(), 1);
        assert_eq!(db.load_courses().unwrap()[0].key().unwrap().as_str(), "BIO");
    }

    #[test]
    fn import_rejects_non_array() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("courses.json");
        std::fs::write(&path, r#"{"courses": []}"#).unwrap();

        let mut db = Database::open_in_memory().unwrap();
        let err = import(&mut db, &path).unwrap_err();
        assert!(err.to_string().contains("must contain a JSON array"));
    }

    #[test]
    fn resolve_prints_course_or_no_match() {
        let mut db = Database::open_in_memory().unwrap();
        db.save_courses(&sample_courses()).unwrap();

        let mut output = Vec::new();
        resolve(&mut output, &db, "file:///Users/a/School/ECON101/notes/week1.html").unwrap();
        resolve(&mut output, &db, "https://news.example.com").unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "ECON101\nno match\n");
    }
}
