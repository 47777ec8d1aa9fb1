//! URL to course resolution.
//!
//! Site rules are checked first across every course, then folder rules for
//! `file://` URLs. The first match in course order, then rule order, wins.

use serde::{Deserialize, Serialize};

use crate::course::{Course, FolderRule};
use crate::types::CourseId;

const FILE_SCHEME: &str = "file://";

/// Tunables for folder matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Require a separator (or end of path) right after a subfolder prefix,
    /// so `/course1` no longer matches `/course10/notes.html`.
    pub strict_folder_boundaries: bool,
}

/// Resolves `url` to the course it belongs to, if any.
pub fn resolve_course(url: &str, courses: &[Course], options: MatchOptions) -> Option<CourseId> {
    let url_lower = url.to_lowercase();
    for course in courses {
        let Some(key) = course.key() else {
            continue;
        };
        let site_hit = course
            .sites
            .iter()
            .any(|site| {
                !site.pattern.is_empty() && url_lower.starts_with(&site.pattern.to_lowercase())
            });
        if site_hit {
            return Some(key);
        }
    }

    let path = file_path_from_url(url)?;
    let path_lower = path.to_lowercase();
    for course in courses {
        let Some(key) = course.key() else {
            continue;
        };
        if course
            .folders
            .iter()
            .any(|folder| folder_matches(folder, &path_lower, options))
        {
            return Some(key);
        }
    }

    None
}

/// Decodes a `file://` URL into a path with `/` separators.
///
/// Returns `None` for other schemes or when the decoded bytes are not UTF-8.
pub fn file_path_from_url(url: &str) -> Option<String> {
    let encoded = url.strip_prefix(FILE_SCHEME)?;
    match urlencoding::decode(encoded) {
        Ok(decoded) => Some(normalize_separators(&decoded)),
        Err(err) => {
            tracing::debug!(%err, url, "undecodable file URL");
            None
        }
    }
}

/// Treats `\` and `/` as the same separator.
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Directory part of a normalized path: everything before the last `/`.
fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |idx| &path[..idx])
}

fn folder_matches(folder: &FolderRule, path_lower: &str, options: MatchOptions) -> bool {
    let base = folder.path.trim();
    if base.is_empty() {
        return false;
    }
    let base_lower = normalize_separators(base).to_lowercase();

    if folder.files_only {
        return folder
            .files
            .iter()
            .any(|file| normalize_separators(file).to_lowercase() == path_lower);
    }

    if folder.include_subfolders {
        let Some(rest) = path_lower.strip_prefix(base_lower.as_str()) else {
            return false;
        };
        return !options.strict_folder_boundaries
            || base_lower.ends_with('/')
            || rest.is_empty()
            || rest.starts_with('/');
    }

    parent_dir(path_lower) == base_lower.trim_end_matches('/')
}
