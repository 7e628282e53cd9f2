//! Shared utilities for pomodorod
//!
//! This crate provides:
//! - Client identifiers for IPC connections
//! - Countdown and duration formatting
//! - Error types
//! - Per-client rate limiting
//! - Default paths for the socket, data, and config files

mod error;
mod ids;
mod paths;
mod rate_limit;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
pub use time::*;
