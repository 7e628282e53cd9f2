//! Pomodoro session engine for pomodorod
//!
//! This crate is the heart of pomodorod, containing:
//! - The session cycle (Work -> Short/Long Break -> Work ...)
//! - Countdown driven by clock ticks, with stale-tick rejection
//! - Completion handling: statistics, notifications, delayed auto-start
//! - Persistence of settings and state after every change

mod engine;
mod events;
mod session;

pub use engine::*;
pub use events::*;
pub use session::*;
