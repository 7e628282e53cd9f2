//! Recording collaborators for testing

use pomo_api::NotifyLevel;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::{
    Clock, ClockEvent, DesktopNotifier, HostError, HostResult, NotificationSink,
    TickSubscription, WakeupToken,
};

/// Clock that never fires on its own.
///
/// Records what the engine asked for; tests deliver events by hand or with
/// [`MockClock::emit`].
pub struct MockClock {
    active: Mutex<Option<TickSubscription>>,
    stopped: Mutex<Vec<TickSubscription>>,
    scheduled: Mutex<Vec<(Duration, WakeupToken)>>,
    event_tx: mpsc::UnboundedSender<ClockEvent>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<ClockEvent>>>,
}

impl MockClock {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            active: Mutex::new(None),
            stopped: Mutex::new(Vec::new()),
            scheduled: Mutex::new(Vec::new()),
            event_tx: tx,
            event_rx: Mutex::new(Some(rx)),
        }
    }

    /// Subscription currently ticking, if any
    pub fn active_subscription(&self) -> Option<TickSubscription> {
        *self.active.lock().unwrap()
    }

    /// Subscriptions that were stopped, in order
    pub fn stopped(&self) -> Vec<TickSubscription> {
        self.stopped.lock().unwrap().clone()
    }

    /// Every wakeup scheduled so far
    pub fn scheduled(&self) -> Vec<(Duration, WakeupToken)> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn last_scheduled(&self) -> Option<(Duration, WakeupToken)> {
        self.scheduled.lock().unwrap().last().copied()
    }

    /// Push an event to the subscriber, as a real clock would
    pub fn emit(&self, event: ClockEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn start_ticking(&self, subscription: TickSubscription) {
        *self.active.lock().unwrap() = Some(subscription);
    }

    fn stop_ticking(&self, subscription: TickSubscription) {
        let mut active = self.active.lock().unwrap();
        if *active == Some(subscription) {
            *active = None;
        }
        self.stopped.lock().unwrap().push(subscription);
    }

    fn schedule_after(&self, delay: Duration, token: WakeupToken) {
        self.scheduled.lock().unwrap().push((delay, token));
    }

    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<ClockEvent>> {
        self.event_rx.lock().unwrap().take()
    }
}

/// One message received by a [`RecordingNotifier`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedNotification {
    pub message: String,
    pub level: NotifyLevel,
    pub duration: Option<Duration>,
}

/// Notification sink that keeps everything it is given
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<RecordedNotification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<RecordedNotification> {
        self.messages.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<RecordedNotification> {
        self.messages.lock().unwrap().last().cloned()
    }

    /// Just the message texts
    pub fn texts(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.messages.lock().unwrap().clear();
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, message: &str, level: NotifyLevel, duration: Option<Duration>) {
        self.messages.lock().unwrap().push(RecordedNotification {
            message: message.to_string(),
            level,
            duration,
        });
    }
}

/// Desktop notifier for testing
pub struct MockDesktopNotifier {
    shown: Mutex<Vec<(String, String)>>,

    /// Configure `show` to fail
    pub fail_show: Arc<Mutex<bool>>,
}

impl MockDesktopNotifier {
    pub fn new() -> Self {
        Self {
            shown: Mutex::new(Vec::new()),
            fail_show: Arc::new(Mutex::new(false)),
        }
    }

    /// Notifications that were shown successfully, as (title, body)
    pub fn shown(&self) -> Vec<(String, String)> {
        self.shown.lock().unwrap().clone()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail_show.lock().unwrap() = fail;
    }
}

impl Default for MockDesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DesktopNotifier for MockDesktopNotifier {
    fn show(&self, title: &str, body: &str) -> HostResult<()> {
        if *self.fail_show.lock().unwrap() {
            return Err(HostError::NotifyFailed("Mock notification failure".into()));
        }
        self.shown
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}
