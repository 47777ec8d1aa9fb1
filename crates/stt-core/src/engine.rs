//! The accrual engine.
//!
//! Holds the live activity signals and the open tracking session. Every
//! signal goes through [`AccrualEngine::handle`], which updates the signals
//! and then re-evaluates:
//!
//! 1. Not active (window unfocused, active tab hidden, or idle/locked):
//!    close any session.
//! 2. Active but the tab's URL is unknown: leave the session alone.
//! 3. URL matches no course: close any session.
//! 4. URL matches the tracked course: keep the session running.
//! 5. URL matches another course: close the session and open a new one.
//!
//! Closing a session writes `max(0, end - start)` to the ledger under the
//! start instant's local day. A session that crosses midnight is credited
//! entirely to the day it started on.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Local, TimeZone, Utc};

use crate::course::Course;
use crate::ledger::{DayKey, LedgerSink};
use crate::matcher::{MatchOptions, resolve_course};
use crate::signal::Signal;
use crate::types::{CourseId, IdleState, TabId};

/// An open accrual interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub course: CourseId,
    pub start: DateTime<Utc>,
}

/// A closed session as written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    pub course: CourseId,
    /// Ledger day, taken from `start`.
    pub day: DayKey,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_ms: i64,
}

/// The ledger rejected a slice. The engine has already moved on.
#[derive(Debug)]
pub struct FlushError<E> {
    pub slice: Slice,
    pub source: E,
}

impl<E> fmt::Display for FlushError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to record {} ms for {} on {}",
            self.slice.duration_ms, self.slice.course, self.slice.day
        )
    }
}

impl<E: std::error::Error + 'static> std::error::Error for FlushError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// What a re-evaluation decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// The signal did not call for a re-evaluation.
    Unchanged,
    /// The user is not active; no session is open.
    Inactive,
    /// The user is active but the tab's URL is unknown.
    UrlUnknown,
    /// The URL belongs to no course; no session is open.
    Unmatched,
    /// The URL belongs to the course already being tracked.
    Continued(CourseId),
    /// A new session was opened for this course.
    Started(CourseId),
}

/// Result of handling one signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub evaluation: Evaluation,
    /// The session closed while handling the signal, if any.
    pub flushed: Option<Slice>,
}

impl Outcome {
    const fn unchanged() -> Self {
        Self {
            evaluation: Evaluation::Unchanged,
            flushed: None,
        }
    }
}

/// Activity state and the open session for one browser profile.
#[derive(Debug)]
pub struct AccrualEngine<Tz: TimeZone = Local> {
    tz: Tz,
    courses: Vec<Course>,
    options: MatchOptions,
    active_tab: Option<TabId>,
    focused: bool,
    visible_tabs: HashSet<TabId>,
    idle_state: IdleState,
    tab_urls: HashMap<TabId, String>,
    tracking: Option<Session>,
    last_url: Option<String>,
}

impl AccrualEngine<Local> {
    /// Creates an engine that buckets days in the local time zone.
    pub fn new(courses: Vec<Course>, options: MatchOptions) -> Self {
        Self::with_timezone(Local, courses, options)
    }
}

impl<Tz: TimeZone> AccrualEngine<Tz> {
    /// Creates an engine that buckets days in `tz`.
    ///
    /// The window starts focused with no active tab, so nothing accrues until
    /// a tab is both active and reported visible.
    pub fn with_timezone(tz: Tz, courses: Vec<Course>, options: MatchOptions) -> Self {
        Self {
            tz,
            courses,
            options,
            active_tab: None,
            focused: true,
            visible_tabs: HashSet::new(),
            idle_state: IdleState::Active,
            tab_urls: HashMap::new(),
            tracking: None,
            last_url: None,
        }
    }

    /// Replaces the course list. Takes effect at the next evaluation.
    pub fn set_courses(&mut self, courses: Vec<Course>) {
        self.courses = courses;
    }

    pub const fn set_match_options(&mut self, options: MatchOptions) {
        self.options = options;
    }

    pub const fn tracking(&self) -> Option<&Session> {
        self.tracking.as_ref()
    }

    pub fn last_url(&self) -> Option<&str> {
        self.last_url.as_deref()
    }

    pub const fn active_tab(&self) -> Option<TabId> {
        self.active_tab
    }

    /// Window focused, active tab visible, and not idle or locked.
    pub fn is_active(&self) -> bool {
        self.focused
            && self
                .active_tab
                .is_some_and(|tab| self.visible_tabs.contains(&tab))
            && self.idle_state == IdleState::Active
    }

    /// Applies one signal at instant `now`.
    ///
    /// On a ledger failure the state transition still completes; the error
    /// carries the slice that could not be recorded.
    pub fn handle<L: LedgerSink>(
        &mut self,
        signal: Signal,
        now: DateTime<Utc>,
        ledger: &mut L,
    ) -> Result<Outcome, FlushError<L::Error>> {
        tracing::debug!(?signal, %now, "handling signal");
        match signal {
            Signal::TabActivated { tab_id, url } => {
                self.active_tab = Some(tab_id);
                if let Some(url) = url {
                    self.tab_urls.insert(tab_id, url);
                }
                self.reevaluate_with(None, now, ledger)
            }
            Signal::TabNavigated { tab_id, url } => {
                self.tab_urls.insert(tab_id, url.clone());
                if self.active_tab == Some(tab_id) {
                    self.reevaluate_with(Some(url), now, ledger)
                } else {
                    Ok(Outcome::unchanged())
                }
            }
            Signal::TabRemoved { tab_id } => {
                self.tab_urls.remove(&tab_id);
                self.visible_tabs.remove(&tab_id);
                if self.active_tab == Some(tab_id) {
                    self.active_tab = None;
                    let flushed = self.stop_tracking(now, ledger)?;
                    Ok(Outcome {
                        evaluation: Evaluation::Inactive,
                        flushed,
                    })
                } else {
                    Ok(Outcome::unchanged())
                }
            }
            Signal::WindowFocusChanged { focused } => {
                self.focused = focused;
                self.reevaluate_with(None, now, ledger)
            }
            Signal::VisibilityChanged { tab_id, visible } => {
                if visible {
                    self.visible_tabs.insert(tab_id);
                } else {
                    self.visible_tabs.remove(&tab_id);
                }
                self.reevaluate_with(None, now, ledger)
            }
            Signal::IdleChanged { state } => {
                self.idle_state = state;
                self.reevaluate_with(None, now, ledger)
            }
        }
    }

    /// Re-runs the evaluation without a new signal, e.g. after the course
    /// list changed.
    pub fn reevaluate<L: LedgerSink>(
        &mut self,
        now: DateTime<Utc>,
        ledger: &mut L,
    ) -> Result<Outcome, FlushError<L::Error>> {
        self.reevaluate_with(None, now, ledger)
    }

    /// Closes the open session, if any. Used when the host shuts down.
    pub fn shutdown<L: LedgerSink>(
        &mut self,
        now: DateTime<Utc>,
        ledger: &mut L,
    ) -> Result<Option<Slice>, FlushError<L::Error>> {
        self.stop_tracking(now, ledger)
    }

    /// Closes the open session and writes its duration to the ledger.
    ///
    /// A no-op without a session. Zero-length and backwards sessions are
    /// dropped without touching the ledger.
    pub fn stop_tracking<L: LedgerSink>(
        &mut self,
        now: DateTime<Utc>,
        ledger: &mut L,
    ) -> Result<Option<Slice>, FlushError<L::Error>> {
        let Some(session) = self.tracking.take() else {
            return Ok(None);
        };
        let duration_ms = (now - session.start).num_milliseconds().max(0);
        if duration_ms == 0 {
            tracing::debug!(course = %session.course, "dropping zero-length session");
            return Ok(None);
        }

        let slice = Slice {
            day: DayKey::for_instant(session.start, &self.tz),
            course: session.course,
            start: session.start,
            end: now,
            duration_ms,
        };
        match ledger.add_time(slice.day, &slice.course, slice.duration_ms) {
            Ok(()) => {
                tracing::info!(
                    course = %slice.course,
                    day = %slice.day,
                    duration_ms,
                    "stopped tracking"
                );
                Ok(Some(slice))
            }
            Err(source) => {
                tracing::error!(
                    course = %slice.course,
                    day = %slice.day,
                    duration_ms,
                    %source,
                    "failed to record slice"
                );
                Err(FlushError { slice, source })
            }
        }
    }

    fn reevaluate_with<L: LedgerSink>(
        &mut self,
        url_hint: Option<String>,
        now: DateTime<Utc>,
        ledger: &mut L,
    ) -> Result<Outcome, FlushError<L::Error>> {
        if !self.is_active() {
            let flushed = self.stop_tracking(now, ledger)?;
            return Ok(Outcome {
                evaluation: Evaluation::Inactive,
                flushed,
            });
        }

        let url = url_hint
            .or_else(|| {
                self.active_tab
                    .and_then(|tab| self.tab_urls.get(&tab).cloned())
            })
            .filter(|url| !url.is_empty());
        let Some(url) = url else {
            return Ok(Outcome {
                evaluation: Evaluation::UrlUnknown,
                flushed: None,
            });
        };

        let resolved = resolve_course(&url, &self.courses, self.options);
        self.last_url = Some(url);

        let Some(course) = resolved else {
            let flushed = self.stop_tracking(now, ledger)?;
            return Ok(Outcome {
                evaluation: Evaluation::Unmatched,
                flushed,
            });
        };

        if self
            .tracking
            .as_ref()
            .is_some_and(|session| session.course == course)
        {
            return Ok(Outcome {
                evaluation: Evaluation::Continued(course),
                flushed: None,
            });
        }

        // Open the new session even if the old one failed to record, so a
        // storage error never stalls tracking.
        let flushed = self.stop_tracking(now, ledger);
        tracing::info!(course = %course, "started tracking");
        self.tracking = Some(Session {
            course: course.clone(),
            start: now,
        });
        Ok(Outcome {
            evaluation: Evaluation::Started(course),
            flushed: flushed?,
        })
    }
}
