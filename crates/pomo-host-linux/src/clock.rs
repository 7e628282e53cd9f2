//! Tokio-backed clock

use pomo_host_api::{Clock, ClockEvent, HostError, HostResult, TickSubscription, WakeupToken};
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Clock that runs one interval task per tick subscription and one sleep
/// task per wakeup, all on the runtime it was created in.
pub struct TokioClock {
    runtime: Handle,
    ticker: Mutex<Option<(TickSubscription, JoinHandle<()>)>>,
    wakeups: Mutex<Vec<JoinHandle<()>>>,
    event_tx: mpsc::UnboundedSender<ClockEvent>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<ClockEvent>>>,
}

impl TokioClock {
    /// Must be called from inside a tokio runtime
    pub fn new() -> HostResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| HostError::Unavailable(format!("no tokio runtime: {}", e)))?;
        let (tx, rx) = mpsc::unbounded_channel();

        Ok(Self {
            runtime,
            ticker: Mutex::new(None),
            wakeups: Mutex::new(Vec::new()),
            event_tx: tx,
            event_rx: Mutex::new(Some(rx)),
        })
    }

    /// Subscription currently ticking, if any
    pub fn active_subscription(&self) -> Option<TickSubscription> {
        match self.ticker.lock() {
            Ok(ticker) => ticker.as_ref().map(|(sub, _)| *sub),
            Err(_) => None,
        }
    }
}

impl Clock for TokioClock {
    fn start_ticking(&self, subscription: TickSubscription) {
        let tx = self.event_tx.clone();
        let task = self.runtime.spawn(async move {
            // first tick one full period after start
            let mut interval = tokio::time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(ClockEvent::Tick(subscription)).is_err() {
                    break;
                }
            }
        });

        let Ok(mut ticker) = self.ticker.lock() else {
            warn!("Clock lock poisoned");
            task.abort();
            return;
        };
        if let Some((old, handle)) = ticker.replace((subscription, task)) {
            debug!(old = %old, "Replacing tick subscription");
            handle.abort();
        }
        debug!(subscription = %subscription, "Ticking started");
    }

    fn stop_ticking(&self, subscription: TickSubscription) {
        let Ok(mut ticker) = self.ticker.lock() else {
            warn!("Clock lock poisoned");
            return;
        };
        let is_current = ticker
            .as_ref()
            .is_some_and(|(current, _)| *current == subscription);
        if is_current && let Some((_, handle)) = ticker.take() {
            handle.abort();
            debug!(subscription = %subscription, "Ticking stopped");
        }
    }

    fn schedule_after(&self, delay: Duration, token: WakeupToken) {
        let tx = self.event_tx.clone();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(ClockEvent::Wakeup(token));
        });

        if let Ok(mut wakeups) = self.wakeups.lock() {
            wakeups.retain(|h| !h.is_finished());
            wakeups.push(task);
        }
        debug!(token = %token, delay_ms = delay.as_millis() as u64, "Wakeup scheduled");
    }

    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<ClockEvent>> {
        self.event_rx.lock().ok()?.take()
    }
}

impl Drop for TokioClock {
    fn drop(&mut self) {
        if let Ok(ticker) = self.ticker.get_mut()
            && let Some((_, handle)) = ticker.take()
        {
            handle.abort();
        }
        if let Ok(wakeups) = self.wakeups.get_mut() {
            for handle in wakeups.drain(..) {
                handle.abort();
            }
        }
    }
}
