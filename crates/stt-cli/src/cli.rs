//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Study time tracker.
///
/// Attributes time spent on course websites and local course files to
/// courses, bucketed per day.
#[derive(Debug, Parser)]
#[command(name = "stt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the database with an empty course list and default settings.
    Init,

    /// Show database location, courses, settings, and today's total.
    Status,

    /// Manage courses and their matching rules.
    #[command(subcommand)]
    Courses(CoursesAction),

    /// Show or change tracker settings.
    #[command(subcommand)]
    Settings(SettingsAction),

    /// Feed browser activity signals (JSON lines) through the tracker.
    Run {
        /// Read signals from this file instead of stdin.
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Show today's total across all courses.
    Today {
        /// Print only the badge label.
        #[arg(long, conflicts_with = "json")]
        badge: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Export the ledger as CSV.
    Export {
        /// Write to this file, or into this directory under the default name.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a browser extension storage dump (courses, log, settings).
    Import {
        /// Path to the JSON dump.
        path: PathBuf,
    },

    /// Delete all recorded time.
    Reset {
        /// Confirm the reset.
        #[arg(long)]
        yes: bool,
    },
}

/// Course subcommands.
#[derive(Debug, Subcommand)]
pub enum CoursesAction {
    /// List configured courses.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Replace the course list with the contents of a JSON file.
    Import {
        /// Path to a JSON array of courses.
        path: PathBuf,
    },
    /// Show which course a URL resolves to.
    Resolve {
        /// A page URL, e.g. `file:///Users/a/School/ECON101/notes.html`.
        url: String,
    },
}

/// Settings subcommands.
#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Print current settings.
    Show,
    /// Set the idle threshold in seconds.
    SetIdle {
        /// Seconds without input before the user counts as idle.
        seconds: u32,
    },
    /// Require a path separator after subfolder prefixes.
    StrictFolders {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
}
