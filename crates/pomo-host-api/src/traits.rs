//! Collaborator traits

use pomo_api::NotifyLevel;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{ClockEvent, TickSubscription, WakeupToken};

/// Errors from host collaborators
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Notification failed: {0}")]
    NotifyFailed(String),

    #[error("Not available: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// Source of elapsed time.
///
/// Implementations deliver [`ClockEvent`]s on the receiver returned by
/// [`subscribe`](Clock::subscribe); the owner of the engine forwards them to
/// it. Calls never block.
pub trait Clock: Send + Sync {
    /// Deliver `ClockEvent::Tick(subscription)` roughly once per second
    /// until stopped. Any previous subscription is replaced.
    fn start_ticking(&self, subscription: TickSubscription);

    /// Stop delivering ticks for `subscription`. Ticks already queued may
    /// still arrive; receivers must compare subscriptions.
    fn stop_ticking(&self, subscription: TickSubscription);

    /// Deliver `ClockEvent::Wakeup(token)` once, after `delay`
    fn schedule_after(&self, delay: Duration, token: WakeupToken);

    /// Take the event receiver. Only the first call gets it.
    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<ClockEvent>>;
}

/// Receives short status messages ("Timer paused") for display.
/// Fire-and-forget.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str, level: NotifyLevel, duration: Option<Duration>);
}

/// System-level desktop notifications, best effort
pub trait DesktopNotifier: Send + Sync {
    fn show(&self, title: &str, body: &str) -> HostResult<()>;

    /// Whether a notification backend was found
    fn is_available(&self) -> bool {
        true
    }
}
