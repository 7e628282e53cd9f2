//! Session cycle rules
//!
//! Pure functions over [`SessionState`]; the engine wraps them with clock,
//! store and notification side effects.

use pomo_api::{SessionKind, SessionState, TimerSettings};

/// Outcome of finishing a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub finished: SessionKind,
    pub next: SessionKind,
    /// Completed work sessions after this transition
    pub session_count: u32,
}

/// Which session follows `finished`.
///
/// `session_count` is the count after any increment for the finished
/// session. A zero `sessions_until_long_break` never yields a long break.
pub fn next_session(
    finished: SessionKind,
    session_count: u32,
    settings: &TimerSettings,
) -> SessionKind {
    match finished {
        SessionKind::Work => {
            if session_count.checked_rem(settings.sessions_until_long_break) == Some(0) {
                SessionKind::LongBreak
            } else {
                SessionKind::ShortBreak
            }
        }
        SessionKind::ShortBreak | SessionKind::LongBreak => SessionKind::Work,
    }
}

/// Finish the current session: count it if it was work, move to the next
/// kind and refill the countdown. Leaves the running flags alone.
pub fn advance(state: &mut SessionState, settings: &TimerSettings) -> Transition {
    let finished = state.current_session;
    if finished == SessionKind::Work {
        state.session_count = state.session_count.saturating_add(1);
    }

    let next = next_session(finished, state.session_count, settings);
    state.current_session = next;
    state.time_left = settings.full_duration_secs(next);

    Transition {
        finished,
        next,
        session_count: state.session_count,
    }
}

/// Elapsed fraction of the current session, within 0.0..=1.0
pub fn progress(state: &SessionState, settings: &TimerSettings) -> f64 {
    let full = settings.full_duration_secs(state.current_session);
    if full == 0 {
        return 0.0;
    }
    let elapsed = full - state.time_left.min(full);
    (f64::from(elapsed) / f64::from(full)).clamp(0.0, 1.0)
}

/// Clamp `time_left` to the current session's full length
pub fn clamp_time_left(state: &mut SessionState, settings: &TimerSettings) {
    let full = settings.full_duration_secs(state.current_session);
    if state.time_left > full {
        state.time_left = full;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work_state(session_count: u32) -> SessionState {
        SessionState {
            session_count,
            ..SessionState::fresh(&TimerSettings::default())
        }
    }

    #[test]
    fn work_goes_to_long_break_on_multiple() {
        let settings = TimerSettings::default();
        let mut state = work_state(3);

        let t = advance(&mut state, &settings);
        assert_eq!(t.finished, SessionKind::Work);
        assert_eq!(t.next, SessionKind::LongBreak);
        assert_eq!(t.session_count, 4);
        assert_eq!(state.time_left, 900);
    }

    #[test]
    fn work_goes_to_short_break_otherwise() {
        let settings = TimerSettings::default();
        for start in [0, 1, 2, 4, 5, 6] {
            let mut state = work_state(start);
            let t = advance(&mut state, &settings);
            assert_eq!(t.next, SessionKind::ShortBreak, "from count {}", start);
            assert_eq!(state.time_left, 300);
        }
    }

    #[test]
    fn breaks_go_back_to_work_without_counting() {
        let settings = TimerSettings::default();
        for kind in [SessionKind::ShortBreak, SessionKind::LongBreak] {
            let mut state = SessionState {
                current_session: kind,
                time_left: 0,
                ..work_state(4)
            };
            let t = advance(&mut state, &settings);
            assert_eq!(t.next, SessionKind::Work);
            assert_eq!(state.session_count, 4);
            assert_eq!(state.time_left, 1500);
        }
    }

    #[test]
    fn long_break_interval_follows_settings() {
        let settings = TimerSettings {
            sessions_until_long_break: 2,
            ..Default::default()
        };
        assert_eq!(next_session(SessionKind::Work, 1, &settings), SessionKind::ShortBreak);
        assert_eq!(next_session(SessionKind::Work, 2, &settings), SessionKind::LongBreak);
        assert_eq!(next_session(SessionKind::Work, 4, &settings), SessionKind::LongBreak);
    }

    #[test]
    fn zero_interval_never_long_breaks() {
        let settings = TimerSettings {
            sessions_until_long_break: 0,
            ..Default::default()
        };
        assert_eq!(next_session(SessionKind::Work, 4, &settings), SessionKind::ShortBreak);
    }

    #[test]
    fn progress_fraction() {
        let settings = TimerSettings::default();
        let mut state = work_state(0);
        assert_eq!(progress(&state, &settings), 0.0);

        state.time_left = 750;
        assert!((progress(&state, &settings) - 0.5).abs() < f64::EPSILON);

        state.time_left = 0;
        assert_eq!(progress(&state, &settings), 1.0);

        // more left than the session holds still reads as not started
        state.time_left = 5000;
        assert_eq!(progress(&state, &settings), 0.0);
    }

    #[test]
    fn clamp_only_lowers() {
        let settings = TimerSettings::default();
        let mut state = work_state(0);
        state.time_left = 4000;
        clamp_time_left(&mut state, &settings);
        assert_eq!(state.time_left, 1500);

        state.time_left = 10;
        clamp_time_left(&mut state, &settings);
        assert_eq!(state.time_left, 10);
    }
}
