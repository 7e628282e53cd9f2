//! Service internals for pomodorod
//!
//! The binary wires these to the real clock, notifier and socket; tests
//! drive them directly.

pub mod dispatch;
pub mod sink;

pub use dispatch::*;
pub use sink::*;
