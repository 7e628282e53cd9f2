//! Error types for pomodorod

use thiserror::Error;

/// Why the daemon refused or failed a client request.
///
/// Each variant corresponds to one wire error code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PomoError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Store error: {0}")]
    StoreError(String),
}

impl PomoError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn invalid_settings(msg: impl Into<String>) -> Self {
        Self::InvalidSettings(msg.into())
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    /// The message without the variant prefix
    pub fn detail(&self) -> String {
        match self {
            Self::InvalidRequest(msg)
            | Self::InvalidSettings(msg)
            | Self::PermissionDenied(msg)
            | Self::StoreError(msg) => msg.clone(),
            Self::RateLimited => "Too many requests".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PomoError>;
