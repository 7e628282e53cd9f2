//! Collaborator interfaces for the pomodorod engine
//!
//! The engine never sleeps, spawns, or talks to the desktop itself. It asks
//! a [`Clock`] for ticks and delayed wakeups, and hands status messages to a
//! [`NotificationSink`] and optionally a [`DesktopNotifier`]. This crate
//! defines those seams plus recording mocks for tests; it contains no
//! platform code.

mod handle;
mod mock;
mod traits;

pub use handle::*;
pub use mock::*;
pub use traits::*;
