//! Session engine

use pomo_api::{EngineSnapshot, NotifyLevel, SessionKind, SessionState, TimerSettings};
use pomo_host_api::{
    Clock, ClockEvent, DesktopNotifier, NotificationSink, TickSubscription, WakeupToken,
};
use pomo_store::{
    load_json, save_json, AuditEvent, AuditEventType, Store, SETTINGS_KEY, STATE_KEY,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{advance, clamp_time_left, progress, CoreEvent};

/// Pause between a completed session and its automatic successor
pub const AUTO_START_DELAY: Duration = Duration::from_secs(3);

/// Title used for desktop notifications
pub const DESKTOP_TITLE: &str = "Pomodoro Timer";

const STATUS_DISPLAY: Duration = Duration::from_millis(1500);
const COMPLETION_DISPLAY: Duration = Duration::from_millis(5000);

/// Owns the timer settings and session state.
///
/// Single-threaded: the owner delivers clock events and client operations
/// one at a time. Every mutation is persisted before the call returns.
pub struct SessionEngine {
    settings: TimerSettings,
    state: SessionState,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    notifications: Arc<dyn NotificationSink>,
    desktop: Option<Arc<dyn DesktopNotifier>>,
    /// Source of subscription and wakeup generations
    generation: u64,
    ticking: Option<TickSubscription>,
    pending_auto_start: Option<WakeupToken>,
}

impl SessionEngine {
    /// Create an engine from whatever the store holds.
    ///
    /// Stored settings win over `default_settings`. A stored state never
    /// resumes running; without one, the engine starts a fresh work session.
    pub fn new(
        default_settings: TimerSettings,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        notifications: Arc<dyn NotificationSink>,
        desktop: Option<Arc<dyn DesktopNotifier>>,
    ) -> Self {
        let settings = match load_json::<TimerSettings>(store.as_ref(), SETTINGS_KEY) {
            Ok(Some(settings)) => settings,
            Ok(None) => default_settings,
            Err(e) => {
                warn!(error = %e, "Stored settings unreadable, using defaults");
                default_settings
            }
        };

        let state = match load_json::<SessionState>(store.as_ref(), STATE_KEY) {
            Ok(Some(mut state)) => {
                state.is_running = false;
                state.is_paused = false;
                clamp_time_left(&mut state, &settings);
                state
            }
            Ok(None) => SessionState::fresh(&settings),
            Err(e) => {
                warn!(error = %e, "Stored state unreadable, starting fresh");
                SessionState::fresh(&settings)
            }
        };

        info!(
            session = %state.current_session,
            time_left = state.time_left,
            session_count = state.session_count,
            "Session engine initialized"
        );

        Self {
            settings,
            state,
            store,
            clock,
            notifications,
            desktop,
            generation: 0,
            ticking: None,
            pending_auto_start: None,
        }
    }

    // Accessors

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn current_session(&self) -> SessionKind {
        self.state.current_session
    }

    pub fn time_left(&self) -> u32 {
        self.state.time_left
    }

    pub fn session_count(&self) -> u32 {
        self.state.session_count
    }

    pub fn total_work_time(&self) -> u64 {
        self.state.total_work_time
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused
    }

    /// Whether an automatic start is waiting on its wakeup
    pub fn auto_start_pending(&self) -> bool {
        self.pending_auto_start.is_some()
    }

    /// Elapsed fraction of the current session, 0.0..=1.0
    pub fn progress(&self) -> f64 {
        progress(&self.state, &self.settings)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            settings: self.settings.clone(),
            state: self.state.clone(),
            progress: self.progress(),
            countdown: pomo_util::format_countdown(self.state.time_left),
        }
    }

    // Operations

    /// Start counting down. No-op if already running.
    pub fn start(&mut self) -> Option<CoreEvent> {
        if self.state.is_running {
            return None;
        }
        self.cancel_auto_start();
        Some(self.begin(false))
    }

    /// Stop counting down, keeping the remaining time. No-op if not running.
    pub fn pause(&mut self) -> Option<CoreEvent> {
        if !self.state.is_running {
            return None;
        }
        self.stop_ticking();
        self.cancel_auto_start();
        self.state.is_running = false;
        self.state.is_paused = true;
        self.persist_state();

        self.notifications
            .notify("Timer paused", NotifyLevel::Info, Some(STATUS_DISPLAY));
        self.audit(AuditEventType::TimerPaused {
            session: self.state.current_session,
            time_left: self.state.time_left,
        });
        info!(
            session = %self.state.current_session,
            time_left = self.state.time_left,
            "Timer paused"
        );

        Some(CoreEvent::TimerPaused {
            session: self.state.current_session,
            time_left: self.state.time_left,
        })
    }

    /// Pause if running, start otherwise
    pub fn toggle(&mut self) -> Option<CoreEvent> {
        if self.state.is_running {
            self.pause()
        } else {
            self.start()
        }
    }

    /// Stop and refill the current session. Statistics are kept.
    pub fn reset(&mut self) -> CoreEvent {
        self.refill();
        self.notifications
            .notify("Timer reset", NotifyLevel::Info, Some(STATUS_DISPLAY));
        self.audit(AuditEventType::TimerReset {
            session: self.state.current_session,
        });
        info!(session = %self.state.current_session, "Timer reset");

        CoreEvent::TimerReset {
            session: self.state.current_session,
            time_left: self.state.time_left,
        }
    }

    /// Finish the current session now, as if it had run out.
    /// The skipped seconds are not counted as work time.
    pub fn skip(&mut self) -> CoreEvent {
        self.stop_ticking();
        self.cancel_auto_start();
        self.complete(true)
    }

    /// Count down one second. Does nothing unless running.
    pub fn tick(&mut self) -> Vec<CoreEvent> {
        if !self.state.is_running {
            return Vec::new();
        }

        self.state.time_left = self.state.time_left.saturating_sub(1);
        if self.state.current_session == SessionKind::Work {
            self.state.total_work_time = self.state.total_work_time.saturating_add(1);
        }
        self.persist_state();

        let mut events = vec![CoreEvent::Tick {
            session: self.state.current_session,
            time_left: self.state.time_left,
            total_work_time: self.state.total_work_time,
        }];

        if self.state.time_left == 0 {
            self.stop_ticking();
            events.push(self.complete(false));
        }

        events
    }

    /// Route a clock delivery. Ticks from a stopped subscription and
    /// wakeups that were cancelled are dropped.
    pub fn handle_clock_event(&mut self, event: ClockEvent) -> Vec<CoreEvent> {
        match event {
            ClockEvent::Tick(subscription) => {
                if self.ticking != Some(subscription) {
                    debug!(subscription = %subscription, "Ignoring stale tick");
                    return Vec::new();
                }
                self.tick()
            }
            ClockEvent::Wakeup(token) => {
                if self.pending_auto_start != Some(token) {
                    debug!(token = %token, "Ignoring cancelled wakeup");
                    return Vec::new();
                }
                self.pending_auto_start = None;
                if self.state.is_running {
                    return Vec::new();
                }
                info!(session = %self.state.current_session, "Auto-starting next session");
                vec![self.begin(true)]
            }
        }
    }

    /// Replace the settings. Values are taken as given; range checks are
    /// the caller's job. When idle, the current session is reset to match.
    pub fn update_settings(&mut self, settings: TimerSettings) -> CoreEvent {
        self.settings = settings;
        if let Err(e) = save_json(self.store.as_ref(), SETTINGS_KEY, &self.settings) {
            warn!(error = %e, "Failed to persist settings");
        }

        if self.state.is_running {
            clamp_time_left(&mut self.state, &self.settings);
            self.persist_state();
        } else {
            self.reset();
        }

        self.notifications
            .notify("Settings saved!", NotifyLevel::Success, None);
        self.audit(AuditEventType::SettingsUpdated {
            settings: self.settings.clone(),
        });
        info!(
            work = self.settings.work_duration,
            short_break = self.settings.short_break_duration,
            long_break = self.settings.long_break_duration,
            "Settings updated"
        );

        CoreEvent::SettingsUpdated {
            settings: self.settings.clone(),
        }
    }

    /// Zero the completed-session count and work time
    pub fn reset_statistics(&mut self) -> CoreEvent {
        let session_count = std::mem::take(&mut self.state.session_count);
        let total_work_time = std::mem::take(&mut self.state.total_work_time);
        self.persist_state();

        self.notifications
            .notify("Statistics reset", NotifyLevel::Info, None);
        self.audit(AuditEventType::StatisticsReset {
            session_count,
            total_work_time,
        });
        info!(session_count, total_work_time, "Statistics reset");

        CoreEvent::StatisticsReset
    }

    /// Stop the clock and write the final state
    pub fn shutdown(&mut self) {
        self.stop_ticking();
        self.cancel_auto_start();
        self.persist_state();
        debug!("Session engine shut down");
    }

    // Internals

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn begin(&mut self, automatic: bool) -> CoreEvent {
        let subscription = TickSubscription::new(self.next_generation());
        self.ticking = Some(subscription);
        self.clock.start_ticking(subscription);

        self.state.is_running = true;
        self.state.is_paused = false;
        self.persist_state();

        self.notifications
            .notify("Timer started!", NotifyLevel::Success, Some(STATUS_DISPLAY));
        self.audit(AuditEventType::TimerStarted {
            session: self.state.current_session,
            time_left: self.state.time_left,
            automatic,
        });
        info!(
            session = %self.state.current_session,
            time_left = self.state.time_left,
            automatic,
            "Timer started"
        );

        CoreEvent::TimerStarted {
            session: self.state.current_session,
            time_left: self.state.time_left,
            automatic,
        }
    }

    /// Invalidate the tick subscription before anything else changes
    fn stop_ticking(&mut self) {
        if let Some(subscription) = self.ticking.take() {
            self.clock.stop_ticking(subscription);
        }
    }

    fn cancel_auto_start(&mut self) {
        if let Some(token) = self.pending_auto_start.take() {
            debug!(token = %token, "Pending auto-start cancelled");
        }
    }

    /// Stop and refill without announcing it
    fn refill(&mut self) {
        self.stop_ticking();
        self.cancel_auto_start();
        self.state.is_running = false;
        self.state.is_paused = false;
        self.state.time_left = self.settings.full_duration_secs(self.state.current_session);
        self.persist_state();
    }

    fn complete(&mut self, skipped: bool) -> CoreEvent {
        self.state.is_running = false;
        self.state.is_paused = false;

        let transition = advance(&mut self.state, &self.settings);
        let finished = transition.finished.completion_label();
        let next = transition.next.display_name();

        self.notifications.notify(
            &format!("{} session complete! Next: {}", finished, next),
            NotifyLevel::Success,
            Some(COMPLETION_DISPLAY),
        );

        if self.settings.show_desktop_notifications
            && let Some(desktop) = &self.desktop
            && let Err(e) = desktop.show(
                DESKTOP_TITLE,
                &format!("{} session complete!\nNext: {}", finished, next),
            )
        {
            warn!(error = %e, "Desktop notification failed");
        }

        let auto_start = self.settings.auto_starts_after(transition.finished);
        if auto_start {
            let token = WakeupToken::new(self.next_generation());
            self.pending_auto_start = Some(token);
            self.clock.schedule_after(AUTO_START_DELAY, token);
        }

        self.persist_state();
        self.audit(AuditEventType::SessionCompleted {
            finished: transition.finished,
            next: transition.next,
            session_count: transition.session_count,
            skipped,
        });
        info!(
            finished = %transition.finished,
            next = %transition.next,
            session_count = transition.session_count,
            skipped,
            auto_start,
            "Session completed"
        );

        CoreEvent::SessionCompleted {
            finished: transition.finished,
            next: transition.next,
            session_count: transition.session_count,
            skipped,
            auto_start_pending: auto_start,
        }
    }

    fn persist_state(&self) {
        if let Err(e) = save_json(self.store.as_ref(), STATE_KEY, &self.state) {
            warn!(error = %e, "Failed to persist session state");
        }
    }

    fn audit(&self, event: AuditEventType) {
        let _ = self.store.append_audit(AuditEvent::new(event));
    }
}
