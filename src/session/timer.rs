//! Phase deadlines.

use super::context::SessionKind;
use std::time::Duration;

/// Seconds shaved off the short deadline so answers land before the node closes the phase.
pub const DEFAULT_SUBMIT_GRACE_SECS: u64 = 10;

/// Deadlines derived from the validation start and phase lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimer {
    validation_start_ms: u64,
    short_session: Duration,
    long_session: Duration,
    grace: Duration,
}

impl SessionTimer {
    /// Timer with the default grace period.
    pub fn new(validation_start_ms: u64, short_session: Duration, long_session: Duration) -> Self {
        Self {
            validation_start_ms,
            short_session,
            long_session,
            grace: Duration::from_secs(DEFAULT_SUBMIT_GRACE_SECS),
        }
    }

    /// Overrides the grace period.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Short-session deadline, unix milliseconds.
    pub fn short_deadline_ms(&self) -> u64 {
        let phase = self.short_session.saturating_sub(self.grace);
        self.validation_start_ms
            .saturating_add(phase.as_millis() as u64)
    }

    /// Long-session deadline: the short deadline plus the long phase.
    pub fn long_deadline_ms(&self) -> u64 {
        self.short_deadline_ms()
            .saturating_add(self.long_session.as_millis() as u64)
    }

    /// Deadline for `kind`, unix milliseconds.
    pub fn deadline_ms(&self, kind: SessionKind) -> u64 {
        match kind {
            SessionKind::Short => self.short_deadline_ms(),
            SessionKind::Long => self.long_deadline_ms(),
        }
    }

    /// Time left in `kind` at `now_ms`; zero once expired.
    pub fn remaining(&self, kind: SessionKind, now_ms: u64) -> Duration {
        Duration::from_millis(self.deadline_ms(kind).saturating_sub(now_ms))
    }

    /// Returns true once `now_ms` reaches the deadline for `kind`.
    pub fn is_expired(&self, kind: SessionKind, now_ms: u64) -> bool {
        now_ms >= self.deadline_ms(kind)
    }
}
