//! Shared data types for the timer and its clients

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three kinds of timed interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Work,
    ShortBreak,
    LongBreak,
}

impl SessionKind {
    /// Name used when announcing the upcoming session
    pub fn display_name(&self) -> &'static str {
        match self {
            SessionKind::Work => "Work Session",
            SessionKind::ShortBreak => "Short Break",
            SessionKind::LongBreak => "Long Break",
        }
    }

    /// Short label used when announcing a finished session
    pub fn completion_label(&self) -> &'static str {
        match self {
            SessionKind::Work => "Work",
            SessionKind::ShortBreak | SessionKind::LongBreak => "Break",
        }
    }

    pub fn is_break(&self) -> bool {
        !matches!(self, SessionKind::Work)
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionKind::Work => "work",
            SessionKind::ShortBreak => "short_break",
            SessionKind::LongBreak => "long_break",
        };
        f.write_str(s)
    }
}

/// User-editable timer settings.
///
/// Durations are whole minutes. Missing fields in stored or received JSON
/// fall back to the defaults, so older payloads still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSettings {
    pub work_duration: u32,
    pub short_break_duration: u32,
    pub long_break_duration: u32,
    pub sessions_until_long_break: u32,
    pub auto_start_breaks: bool,
    pub auto_start_work: bool,
    pub show_desktop_notifications: bool,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            work_duration: 25,
            short_break_duration: 5,
            long_break_duration: 15,
            sessions_until_long_break: 4,
            auto_start_breaks: false,
            auto_start_work: false,
            show_desktop_notifications: true,
        }
    }
}

impl TimerSettings {
    /// Configured length of a session kind, in minutes
    pub fn minutes_for(&self, kind: SessionKind) -> u32 {
        match kind {
            SessionKind::Work => self.work_duration,
            SessionKind::ShortBreak => self.short_break_duration,
            SessionKind::LongBreak => self.long_break_duration,
        }
    }

    /// Full countdown length of a session kind, in seconds
    pub fn full_duration_secs(&self, kind: SessionKind) -> u32 {
        self.minutes_for(kind).saturating_mul(60)
    }

    /// Whether finishing `finished` should start the next session on its own
    pub fn auto_starts_after(&self, finished: SessionKind) -> bool {
        match finished {
            SessionKind::Work => self.auto_start_breaks,
            SessionKind::ShortBreak | SessionKind::LongBreak => self.auto_start_work,
        }
    }
}

/// Mutable countdown state, persisted after every change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub is_paused: bool,
    pub current_session: SessionKind,
    /// Seconds remaining in the current session
    pub time_left: u32,
    /// Completed work sessions
    #[serde(default)]
    pub session_count: u32,
    /// Seconds spent running work sessions
    #[serde(default)]
    pub total_work_time: u64,
}

impl SessionState {
    /// Fresh state: a full work session, nothing counted yet
    pub fn fresh(settings: &TimerSettings) -> Self {
        Self {
            is_running: false,
            is_paused: false,
            current_session: SessionKind::Work,
            time_left: settings.full_duration_secs(SessionKind::Work),
            session_count: 0,
            total_work_time: 0,
        }
    }
}

/// Severity of a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyLevel {
    Success,
    Info,
}

impl fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyLevel::Success => f.write_str("success"),
            NotifyLevel::Info => f.write_str("info"),
        }
    }
}

/// Everything a client needs to draw the timer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub settings: TimerSettings,
    pub state: SessionState,
    /// Elapsed fraction of the current session, 0.0..=1.0
    pub progress: f64,
    /// `time_left` rendered as `MM:SS`
    pub countdown: String,
}

/// One audit record, as shown to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub timestamp: chrono::DateTime<chrono::Local>,
    pub event_type: String,
    pub details: serde_json::Value,
}

/// Role for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Same user as the daemon - may drive the timer
    Controller,
    /// Read-only observer
    Observer,
}

impl ClientRole {
    pub fn can_control(&self) -> bool {
        matches!(self, ClientRole::Controller)
    }
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub ready: bool,
    pub store_ok: bool,
    pub desktop_notifications: bool,
}
