//! Event types for pomodorod -> client streaming

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{EngineSnapshot, NotifyLevel, SessionKind, TimerSettings, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: pomo_util::now(),
            payload,
        }
    }
}

/// All possible events from the daemon to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Full snapshot after any command that changed state
    StateChanged(EngineSnapshot),

    TimerStarted {
        session: SessionKind,
        time_left: u32,
        /// Started by the auto-start delay rather than a client
        automatic: bool,
    },

    TimerPaused {
        session: SessionKind,
        time_left: u32,
    },

    TimerReset {
        session: SessionKind,
        time_left: u32,
    },

    /// One second elapsed on a running countdown
    Tick {
        session: SessionKind,
        time_left: u32,
        total_work_time: u64,
    },

    SessionCompleted {
        finished: SessionKind,
        next: SessionKind,
        session_count: u32,
        skipped: bool,
        /// The next session will start after the auto-start delay
        auto_start_pending: bool,
    },

    SettingsUpdated {
        settings: TimerSettings,
    },

    StatisticsReset,

    /// Status message for display as a toast
    Notification {
        message: String,
        level: NotifyLevel,
        /// How long to show it; `None` leaves it to the client
        duration_ms: Option<u64>,
    },

    /// Daemon is shutting down
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization() {
        let event = Event::new(EventPayload::SessionCompleted {
            finished: SessionKind::Work,
            next: SessionKind::ShortBreak,
            session_count: 1,
            skipped: false,
            auto_start_pending: true,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"session_completed""#));

        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.api_version, API_VERSION);
        assert!(matches!(
            parsed.payload,
            EventPayload::SessionCompleted {
                next: SessionKind::ShortBreak,
                ..
            }
        ));
    }

    #[test]
    fn unit_events_serialize_with_tag_only() {
        let json = serde_json::to_string(&EventPayload::Shutdown).unwrap();
        assert_eq!(json, r#"{"type":"shutdown"}"#);
    }
}
