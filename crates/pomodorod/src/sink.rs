//! Notification sink that fans status messages out to IPC subscribers

use pomo_api::{Event, EventPayload, NotifyLevel};
use pomo_host_api::NotificationSink;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

/// Logs each message and broadcasts it as an `EventPayload::Notification`
pub struct BroadcastSink {
    events: broadcast::Sender<Event>,
}

impl BroadcastSink {
    pub fn new(events: broadcast::Sender<Event>) -> Self {
        Self { events }
    }
}

impl NotificationSink for BroadcastSink {
    fn notify(&self, message: &str, level: NotifyLevel, duration: Option<Duration>) {
        info!(level = %level, "{}", message);
        // no subscribers is fine
        let _ = self.events.send(Event::new(EventPayload::Notification {
            message: message.to_string(),
            level,
            duration_ms: duration.map(|d| d.as_millis() as u64),
        }));
    }
}
