//! Settings validation
//!
//! The engine accepts any settings it is given; range checks happen here,
//! before settings reach it.

use crate::schema::RawConfig;
use pomo_api::TimerSettings;
use std::ops::RangeInclusive;
use thiserror::Error;

pub const WORK_DURATION_RANGE: RangeInclusive<u32> = 1..=60;
pub const SHORT_BREAK_DURATION_RANGE: RangeInclusive<u32> = 1..=30;
pub const LONG_BREAK_DURATION_RANGE: RangeInclusive<u32> = 1..=60;
pub const SESSIONS_UNTIL_LONG_BREAK_RANGE: RangeInclusive<u32> = 2..=10;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} = {value} is out of range ({min}-{max})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

/// Check every numeric setting against its allowed range.
///
/// All failures are reported, not just the first.
pub fn validate_settings(settings: &TimerSettings) -> Vec<ValidationError> {
    let checks = [
        ("work_duration", settings.work_duration, WORK_DURATION_RANGE),
        (
            "short_break_duration",
            settings.short_break_duration,
            SHORT_BREAK_DURATION_RANGE,
        ),
        (
            "long_break_duration",
            settings.long_break_duration,
            LONG_BREAK_DURATION_RANGE,
        ),
        (
            "sessions_until_long_break",
            settings.sessions_until_long_break,
            SESSIONS_UNTIL_LONG_BREAK_RANGE,
        ),
    ];

    checks
        .into_iter()
        .filter(|(_, value, range)| !range.contains(value))
        .map(|(field, value, range)| ValidationError::OutOfRange {
            field,
            value,
            min: *range.start(),
            max: *range.end(),
        })
        .collect()
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    validate_settings(&config.timer.resolve())
}

/// Join errors into one line for protocol error messages
pub fn describe_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
