//! Tracker settings stored alongside the course list.

use serde::{Deserialize, Serialize};

use crate::matcher::MatchOptions;

/// Idle threshold used when none is configured.
pub const DEFAULT_IDLE_THRESHOLD_SECS: u32 = 60;

/// Shortest detection interval the idle detector supports.
pub const MIN_IDLE_DETECTION_SECS: u32 = 15;

/// Longest detection interval the idle detector supports.
pub const MAX_IDLE_DETECTION_SECS: u32 = 600;

/// The `settings` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Seconds without input before the user counts as idle.
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_sec: u32,

    /// Use separator-aware prefix checks for subfolder rules.
    #[serde(default)]
    pub strict_folder_boundaries: bool,
}

const fn default_idle_threshold() -> u32 {
    DEFAULT_IDLE_THRESHOLD_SECS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            idle_threshold_sec: DEFAULT_IDLE_THRESHOLD_SECS,
            strict_folder_boundaries: false,
        }
    }
}

impl Settings {
    /// Parses a stored `settings` document; anything unreadable yields defaults.
    pub fn from_document(value: &serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_else(|err| {
            tracing::warn!(%err, "unreadable settings document, using defaults");
            Self::default()
        })
    }

    /// Interval handed to the idle detector.
    ///
    /// Zero means "unset" and becomes the default before clamping.
    pub fn idle_detection_secs(&self) -> u32 {
        let threshold = if self.idle_threshold_sec == 0 {
            DEFAULT_IDLE_THRESHOLD_SECS
        } else {
            self.idle_threshold_sec
        };
        threshold.clamp(MIN_IDLE_DETECTION_SECS, MAX_IDLE_DETECTION_SECS)
    }

    pub const fn match_options(&self) -> MatchOptions {
        MatchOptions {
            strict_folder_boundaries: self.strict_folder_boundaries,
        }
    }
}
