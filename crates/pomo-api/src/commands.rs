//! Command types for the pomodorod protocol

use serde::{Deserialize, Serialize};
use pomo_util::{ClientId, PomoError};

use crate::{ClientRole, EngineSnapshot, HealthStatus, HistoryEntry, TimerSettings, API_VERSION};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    pub api_version: u32,
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub request_id: u64,
    pub api_version: u32,
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<PomoError> for ErrorInfo {
    fn from(err: PomoError) -> Self {
        let code = match &err {
            PomoError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            PomoError::InvalidSettings(_) => ErrorCode::InvalidSettings,
            PomoError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            PomoError::RateLimited => ErrorCode::RateLimited,
            PomoError::StoreError(_) => ErrorCode::StoreError,
        };
        Self::new(code, err.detail())
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    InvalidSettings,
    PermissionDenied,
    RateLimited,
    StoreError,
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Get settings, countdown and statistics
    GetState,

    /// Start counting down (no-op if already running)
    Start,

    /// Pause the countdown (no-op if not running)
    Pause,

    /// Pause if running, start otherwise
    Toggle,

    /// Stop and refill the current session
    Reset,

    /// Finish the current session immediately
    Skip,

    /// Replace the timer settings
    UpdateSettings { settings: TimerSettings },

    /// Zero the completed-session count and work time
    ResetStatistics,

    /// Most recent audit records, newest first
    GetRecentHistory { limit: usize },

    /// Subscribe to events (returns immediately, events stream separately)
    SubscribeEvents,

    UnsubscribeEvents,

    GetHealth,

    /// Ping for keepalive
    Ping,
}

impl Command {
    /// Whether the command changes timer state or settings
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Command::Start
                | Command::Pause
                | Command::Toggle
                | Command::Reset
                | Command::Skip
                | Command::UpdateSettings { .. }
                | Command::ResetStatistics
        )
    }
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    State(EngineSnapshot),
    History { entries: Vec<HistoryEntry> },
    Subscribed { client_id: ClientId },
    Unsubscribed,
    Health(HealthStatus),
    Pong,
}

/// Client connection info (set by IPC layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: ClientId,
    pub role: ClientRole,
    /// Unix UID if available
    pub uid: Option<u32>,
}

impl ClientInfo {
    pub fn new(role: ClientRole) -> Self {
        Self {
            client_id: ClientId::new(),
            role,
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }
}
