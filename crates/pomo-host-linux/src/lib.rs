//! Linux collaborators for pomodorod
//!
//! Provides:
//! - A [`Clock`](pomo_host_api::Clock) backed by tokio timers
//! - Desktop notifications through `notify-send`

mod clock;
mod notify;

pub use clock::*;
pub use notify::*;
