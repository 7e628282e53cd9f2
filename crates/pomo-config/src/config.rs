//! Validated configuration

use crate::schema::{RawConfig, RawDaemonConfig, RawTimerConfig};
use pomo_api::TimerSettings;
use std::path::PathBuf;

/// Validated configuration ready for the daemon
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub daemon: DaemonConfig,

    /// Settings used until a client saves its own
    pub timer: TimerSettings,
}

impl Config {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            daemon: DaemonConfig::from_raw(raw.daemon),
            timer: raw.timer.resolve(),
        }
    }
}

/// Paths the daemon should use. `None` defers to the environment or the
/// XDG defaults.
#[derive(Debug, Clone, Default)]
pub struct DaemonConfig {
    pub socket_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

impl DaemonConfig {
    fn from_raw(raw: RawDaemonConfig) -> Self {
        Self {
            socket_path: raw.socket_path,
            data_dir: raw.data_dir,
        }
    }
}

impl RawTimerConfig {
    /// Fill unset fields from [`TimerSettings::default`]
    pub fn resolve(&self) -> TimerSettings {
        let d = TimerSettings::default();
        TimerSettings {
            work_duration: self.work_duration.unwrap_or(d.work_duration),
            short_break_duration: self.short_break_duration.unwrap_or(d.short_break_duration),
            long_break_duration: self.long_break_duration.unwrap_or(d.long_break_duration),
            sessions_until_long_break: self
                .sessions_until_long_break
                .unwrap_or(d.sessions_until_long_break),
            auto_start_breaks: self.auto_start_breaks.unwrap_or(d.auto_start_breaks),
            auto_start_work: self.auto_start_work.unwrap_or(d.auto_start_work),
            show_desktop_notifications: self
                .show_desktop_notifications
                .unwrap_or(d.show_desktop_notifications),
        }
    }
}
