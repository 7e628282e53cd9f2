//! Time helpers for pomodorod

use chrono::{DateTime, Local};
use std::time::Duration;

/// Current local time, used for audit timestamps
pub fn now() -> DateTime<Local> {
    Local::now()
}

/// Render a countdown as `MM:SS`.
///
/// Minutes are not wrapped into hours, so 3600 seconds renders as `60:00`.
pub fn format_countdown(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Human-readable duration, e.g. `1h 5m` or `42s`
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Whole minutes of accumulated work time, for statistics displays
pub fn whole_minutes(seconds: u64) -> u64 {
    seconds / 60
}

/// Format a timestamp for history listings
pub fn format_datetime_full(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
