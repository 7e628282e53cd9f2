//! Audit event types

use chrono::{DateTime, Local};
use pomo_api::{HistoryEntry, SessionKind, TimerSettings};
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    ServiceStarted,

    ServiceStopped,

    TimerStarted {
        session: SessionKind,
        time_left: u32,
        automatic: bool,
    },

    TimerPaused {
        session: SessionKind,
        time_left: u32,
    },

    TimerReset {
        session: SessionKind,
    },

    /// A session ran out or was skipped
    SessionCompleted {
        finished: SessionKind,
        next: SessionKind,
        session_count: u32,
        skipped: bool,
    },

    SettingsUpdated {
        settings: TimerSettings,
    },

    /// Statistics zeroed; records what was discarded
    StatisticsReset {
        session_count: u32,
        total_work_time: u64,
    },

    ClientConnected {
        client_id: String,
        role: String,
        uid: Option<u32>,
    },

    ClientDisconnected {
        client_id: String,
    },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID, assigned by the store
    pub id: i64,

    pub timestamp: DateTime<Local>,

    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0,
            timestamp: pomo_util::now(),
            event,
        }
    }

    /// Client-facing form: the event tag plus its remaining fields
    pub fn to_history_entry(&self) -> HistoryEntry {
        let mut details = serde_json::to_value(&self.event).unwrap_or_default();
        let event_type = details
            .as_object_mut()
            .and_then(|obj| obj.remove("type"))
            .and_then(|t| t.as_str().map(str::to_owned))
            .unwrap_or_default();

        HistoryEntry {
            id: self.id,
            timestamp: self.timestamp,
            event_type,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_entry_splits_tag_from_details() {
        let event = AuditEvent::new(AuditEventType::SessionCompleted {
            finished: SessionKind::Work,
            next: SessionKind::LongBreak,
            session_count: 4,
            skipped: true,
        });

        let entry = event.to_history_entry();
        assert_eq!(entry.event_type, "session_completed");
        assert_eq!(entry.details["next"], "long_break");
        assert_eq!(entry.details["session_count"], 4);
        assert!(entry.details.get("type").is_none());
    }

    #[test]
    fn unit_variant_has_empty_details() {
        let entry = AuditEvent::new(AuditEventType::ServiceStarted).to_history_entry();
        assert_eq!(entry.event_type, "service_started");
        assert_eq!(entry.details, serde_json::json!({}));
    }
}
