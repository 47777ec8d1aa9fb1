//! Course definitions and their matching rules.
//!
//! Course documents are written by the options page in the extension's
//! camelCase shape. Parsing is lenient: a rule or course that fails to
//! deserialize is dropped instead of failing the whole list.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::CourseId;

/// Color used when a course has none.
pub const DEFAULT_COLOR: &str = "#6366f1";

/// A named tracking bucket with site and folder rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    /// Ledger key. Falls back to `name` when absent or empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Display color (CSS hex).
    #[serde(default = "default_color")]
    pub color: String,

    /// Local folder and file rules.
    #[serde(default, deserialize_with = "lenient_list")]
    pub folders: Vec<FolderRule>,

    /// Website prefix rules.
    #[serde(default, deserialize_with = "lenient_list")]
    pub sites: Vec<SiteRule>,
}

/// A local filesystem location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRule {
    #[serde(default)]
    pub path: String,

    /// Match anything below `path`, not only its direct children.
    #[serde(default)]
    pub include_subfolders: bool,

    /// Match only the paths listed in `files`.
    #[serde(default)]
    pub files_only: bool,

    #[serde(default, deserialize_with = "lenient_list")]
    pub files: Vec<String>,
}

/// A case-insensitive URL prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRule {
    #[serde(default)]
    pub pattern: String,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

impl Course {
    /// Creates a course whose id and name are both `id`.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            id: Some(id.clone()),
            name: Some(id),
            color: default_color(),
            folders: Vec::new(),
            sites: Vec::new(),
        }
    }

    /// Adds a website prefix rule.
    #[must_use]
    pub fn with_site(mut self, pattern: impl Into<String>) -> Self {
        self.sites.push(SiteRule {
            pattern: pattern.into(),
        });
        self
    }

    /// Adds a folder rule.
    #[must_use]
    pub fn with_folder(mut self, folder: FolderRule) -> Self {
        self.folders.push(folder);
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The ledger key: `id` if non-empty, else `name` if non-empty.
    ///
    /// Courses with neither never match anything.
    pub fn key(&self) -> Option<CourseId> {
        [self.id.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|value| CourseId::new(value).ok())
    }

    /// The label shown to users: `name` if non-empty, else `id`.
    pub fn display_name(&self) -> Option<&str> {
        [self.name.as_deref(), self.id.as_deref()]
            .into_iter()
            .flatten()
            .find(|value| !value.is_empty())
    }
}

impl FolderRule {
    /// A folder rule matching `path` and everything below it.
    pub fn recursive(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            include_subfolders: true,
            ..Self::default()
        }
    }

    /// A folder rule matching only direct children of `path`.
    pub fn shallow(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// A rule matching only the listed files.
    pub fn files<I, S>(path: impl Into<String>, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into(),
            files_only: true,
            files: files.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Parses a stored `courses` document, dropping malformed entries.
///
/// Anything other than a JSON array yields an empty list.
pub fn parse_courses(value: &serde_json::Value) -> Vec<Course> {
    match value {
        serde_json::Value::Array(items) => collect_lenient(items),
        _ => Vec::new(),
    }
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Array(items) => collect_lenient(&items),
        _ => Vec::new(),
    })
}

fn collect_lenient<T: DeserializeOwned>(items: &[serde_json::Value]) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::debug!(%err, "skipping malformed configuration entry");
                None
            }
        })
        .collect()
}
