//! Core events emitted by the engine

use pomo_api::{SessionKind, TimerSettings};

/// Events emitted by the session engine
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    TimerStarted {
        session: SessionKind,
        time_left: u32,
        /// Fired by the auto-start wakeup
        automatic: bool,
    },

    TimerPaused {
        session: SessionKind,
        time_left: u32,
    },

    TimerReset {
        session: SessionKind,
        time_left: u32,
    },

    /// One second counted down
    Tick {
        session: SessionKind,
        time_left: u32,
        total_work_time: u64,
    },

    SessionCompleted {
        finished: SessionKind,
        next: SessionKind,
        session_count: u32,
        skipped: bool,
        auto_start_pending: bool,
    },

    SettingsUpdated {
        settings: TimerSettings,
    },

    StatisticsReset,
}
