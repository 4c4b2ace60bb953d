use crate::session::{SessionKind, SessionTimer};
use serde::Serialize;
use std::time::Duration;

/// Deadlines and time left, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerReport {
    /// Short-session deadline, unix ms.
    pub short_deadline_ms: u64,
    /// Long-session deadline, unix ms.
    pub long_deadline_ms: u64,
    /// Time left in the short session.
    pub short_remaining_ms: u64,
    /// Time left in the long session.
    pub long_remaining_ms: u64,
}

/// Computes the session deadlines for a validation starting at `start_ms`.
pub fn run_timer(
    start_ms: u64,
    short_session: Duration,
    long_session: Duration,
    grace: Duration,
    now_ms: u64,
) -> TimerReport {
    let timer = SessionTimer::new(start_ms, short_session, long_session).with_grace(grace);
    TimerReport {
        short_deadline_ms: timer.short_deadline_ms(),
        long_deadline_ms: timer.long_deadline_ms(),
        short_remaining_ms: timer.remaining(SessionKind::Short, now_ms).as_millis() as u64,
        long_remaining_ms: timer.remaining(SessionKind::Long, now_ms).as_millis() as u64,
    }
}
