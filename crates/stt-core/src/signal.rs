//! Activity signals delivered by the host browser.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{IdleState, TabId};

/// A host event that may change whether, and for which course, time accrues.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Signal {
    /// The user switched to a different tab.
    TabActivated {
        tab_id: TabId,
        /// The tab's URL, when the host knows it at activation time.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    /// A tab finished loading a page.
    TabNavigated { tab_id: TabId, url: String },
    /// A tab was closed.
    TabRemoved { tab_id: TabId },
    /// The browser window gained or lost focus.
    WindowFocusChanged { focused: bool },
    /// A page reported its visibility.
    VisibilityChanged { tab_id: TabId, visible: bool },
    /// The idle detector changed state.
    IdleChanged { state: IdleState },
}

/// A signal with the instant it was observed, as read from a replay stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimedSignal {
    /// When the signal happened. Absent means "now" at the time of reading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
    pub signal: Signal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_signal() {
        let json = r#"{"type": "visibility_changed", "tab_id": 7, "visible": true}"#;
        let signal: Signal = serde_json::from_str(json).unwrap();
        assert_eq!(
            signal,
            Signal::VisibilityChanged {
                tab_id: TabId(7),
                visible: true
            }
        );
    }

    #[test]
    fn tab_activated_url_is_optional() {
        let signal: Signal =
            serde_json::from_str(r#"{"type": "tab_activated", "tab_id": 3}"#).unwrap();
        assert_eq!(
            signal,
            Signal::TabActivated {
                tab_id: TabId(3),
                url: None
            }
        );
    }

    #[test]
    fn timed_signal_without_timestamp() {
        let json = r#"{"signal": {"type": "idle_changed", "state": "locked"}}"#;
        let timed: TimedSignal = serde_json::from_str(json).unwrap();
        assert!(timed.at.is_none());
        assert_eq!(
            timed.signal,
            Signal::IdleChanged {
                state: IdleState::Locked
            }
        );
    }

    #[test]
    fn rejects_unknown_signal_type() {
        let result: Result<Signal, _> =
            serde_json::from_str(r#"{"type": "tab_moved", "tab_id": 1}"#);
        assert!(result.is_err());
    }
}
