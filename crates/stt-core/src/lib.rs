//! Core domain logic for the study time tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Matching: resolving a page URL to the course it belongs to
//! - Accrual: turning browser activity signals into per-day, per-course time
//! - Export: flattening the ledger into CSV rows

pub mod course;
pub mod engine;
pub mod export;
pub mod ledger;
pub mod matcher;
pub mod settings;
pub mod signal;
pub mod types;

pub use course::{Course, FolderRule, SiteRule, parse_courses};
pub use engine::{AccrualEngine, Evaluation, FlushError, Outcome, Session, Slice};
pub use export::{ExportDocument, ExportError, ExportRow, export_document};
pub use ledger::{DayKey, DaySummary, Ledger, LedgerEntry, LedgerSink};
pub use matcher::{MatchOptions, resolve_course};
pub use settings::Settings;
pub use signal::{Signal, TimedSignal};
pub use types::{CourseId, IdleState, TabId, ValidationError};
