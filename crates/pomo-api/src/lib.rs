//! Protocol and data types for pomodorod
//!
//! This crate defines what the daemon, its clients and its store agree on:
//! - Timer settings and session state (also the persisted shapes)
//! - Commands (requests from clients) and responses
//! - Events (daemon -> subscribed clients)
//! - Versioning

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
