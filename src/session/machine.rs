//! Transition function for the validation session.

use super::context::{
    has_all_answers, has_all_relevance_marks, SessionContext, SessionFlip, SessionKind,
};
use super::state::{
    AnswerState, LongPhase, NavPosition, SessionCommand, SessionEvent, SessionState, ShortPhase,
    Transition,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A validation session: the active state plus its context.
///
/// All mutation goes through [`ValidationSession::handle`], which never
/// performs I/O.  Submissions are requested through
/// [`Transition::Command`] and their outcome is fed back as
/// [`SessionEvent::SubmissionSucceeded`] or
/// [`SessionEvent::SubmissionFailed`].
///
/// While a submission is pending, answer and relevance events are ignored
/// and navigation stays available.  Repeated `Submit`/`FinishFlips` events
/// are ignored until the pending submission resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSession {
    state: SessionState,
    context: SessionContext,
}

impl ValidationSession {
    /// Idle session for `epoch`; `validation_start` is unix milliseconds.
    pub fn new(epoch: u64, validation_start: u64) -> Self {
        Self {
            state: SessionState::Idle,
            context: SessionContext::new(epoch, validation_start),
        }
    }

    /// Active state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Session context.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Phase kind of the active state.
    pub fn active_kind(&self) -> Option<SessionKind> {
        self.state.kind()
    }

    /// Flips counting toward the active phase.
    pub fn active_flips(&self) -> Vec<&SessionFlip> {
        match self.active_kind() {
            Some(kind) => self.context.active_flips(kind),
            None => Vec::new(),
        }
    }

    /// Flip under the cursor.
    pub fn current_flip(&self) -> Option<&SessionFlip> {
        self.context.current_flip(self.active_kind()?)
    }

    /// Returns true while a submission is in flight.
    pub fn is_submitting(&self) -> bool {
        self.state.is_submitting()
    }

    /// Returns true while relevance marks are being collected.
    pub fn is_keywords_phase(&self) -> bool {
        matches!(
            self.state,
            SessionState::LongSession(LongPhase::Keywords)
                | SessionState::LongSession(LongPhase::Submitting)
                | SessionState::LongSession(LongPhase::SubmitFailed { .. })
        )
    }

    /// Returns true when the cursor is on the first active flip.
    pub fn is_first_flip(&self) -> bool {
        self.context.current_index == 0
    }

    /// Returns true when the cursor is on the last active flip.
    pub fn is_last_flip(&self) -> bool {
        let len = self.active_flips().len();
        len > 0 && self.context.current_index == len - 1
    }

    /// Navigation sub-state, while solving.
    pub fn nav(&self) -> Option<NavPosition> {
        if !self.state.is_solving() {
            return None;
        }
        let len = self.active_flips().len();
        let idx = self.context.current_index;
        Some(if idx + 1 >= len {
            NavPosition::LastFlip
        } else if idx == 0 {
            NavPosition::FirstFlip
        } else {
            NavPosition::MidFlip
        })
    }

    /// Answer sub-state of the current flip, while solving.
    pub fn answer_state(&self) -> Option<AnswerState> {
        if !self.state.is_solving() {
            return None;
        }
        let marked = match self.current_flip() {
            Some(flip) if self.is_keywords_phase() => flip.relevance.is_some(),
            Some(flip) => flip.option.is_some(),
            None => false,
        };
        Some(if marked {
            AnswerState::Answered
        } else {
            AnswerState::Unanswered
        })
    }

    /// Whether `Submit` (or `FinishFlips` in the long flips phase) is accepted.
    ///
    /// True when every active flip carries the phase's mark, or the cursor
    /// is on the last flip, or the phase deadline has passed; never while a
    /// submission is pending.
    pub fn can_submit(&self) -> bool {
        let kind = match self.active_kind() {
            Some(kind) => kind,
            None => return false,
        };
        let flips = self.context.active_flips(kind);
        let complete = match &self.state {
            SessionState::ShortSession(ShortPhase::Solve)
            | SessionState::ShortSession(ShortPhase::SubmitFailed { .. })
            | SessionState::LongSession(LongPhase::Flips) => has_all_answers(&flips),
            SessionState::LongSession(LongPhase::Keywords)
            | SessionState::LongSession(LongPhase::SubmitFailed { .. }) => {
                has_all_relevance_marks(&flips)
            }
            _ => return false,
        };
        complete || self.is_last_flip() || self.context.is_expired(kind)
    }

    /// Applies `event` in place.
    pub fn handle(&mut self, event: SessionEvent) -> Transition {
        if self.state.is_terminal() {
            return Transition::Ignored;
        }
        let from = self.state.path();
        let outcome = self.apply(event);
        if outcome != Transition::Ignored && from != self.state.path() {
            debug!(from, to = self.state.path(), "session transition");
        }
        outcome
    }

    fn apply(&mut self, event: SessionEvent) -> Transition {
        match event {
            SessionEvent::Start => match self.state {
                SessionState::Idle => {
                    self.state = SessionState::ShortSession(ShortPhase::Solve);
                    self.context.current_index = 0;
                    Transition::Changed
                }
                _ => Transition::Ignored,
            },
            SessionEvent::FlipsFetched { kind, flips } => {
                self.context.merge_flips(kind, flips);
                if self.active_kind() == Some(kind) {
                    self.context.clamp_cursor(kind);
                }
                Transition::Changed
            }
            SessionEvent::FlipDecoded { kind, hash, images } => {
                let flip = self
                    .context
                    .flips_mut(kind)
                    .iter_mut()
                    .find(|flip| flip.hash == hash);
                match flip {
                    Some(flip) => {
                        flip.images = images;
                        flip.loaded = true;
                        flip.decoded = true;
                        Transition::Changed
                    }
                    None => Transition::Ignored,
                }
            }
            SessionEvent::Answer { option } => {
                let kind = match &self.state {
                    SessionState::ShortSession(ShortPhase::Solve)
                    | SessionState::ShortSession(ShortPhase::SubmitFailed { .. }) => {
                        SessionKind::Short
                    }
                    SessionState::LongSession(LongPhase::Flips) => SessionKind::Long,
                    _ => return Transition::Ignored,
                };
                match self.context.current_flip_mut(kind) {
                    Some(flip) => {
                        flip.option = Some(option);
                        Transition::Changed
                    }
                    None => Transition::Ignored,
                }
            }
            SessionEvent::ToggleWords { relevance } => {
                if !matches!(
                    self.state,
                    SessionState::LongSession(LongPhase::Keywords)
                        | SessionState::LongSession(LongPhase::SubmitFailed { .. })
                ) {
                    return Transition::Ignored;
                }
                match self.context.current_flip_mut(SessionKind::Long) {
                    Some(flip) => {
                        flip.relevance = Some(relevance);
                        Transition::Changed
                    }
                    None => Transition::Ignored,
                }
            }
            SessionEvent::Pick { index } => {
                if !self.state.is_solving() || index >= self.active_flips().len() {
                    return Transition::Ignored;
                }
                self.context.current_index = index;
                Transition::Changed
            }
            SessionEvent::Next => {
                if !self.state.is_solving() || self.context.current_index + 1 >= self.active_flips().len() {
                    return Transition::Ignored;
                }
                self.context.current_index += 1;
                Transition::Changed
            }
            SessionEvent::Prev => {
                if !self.state.is_solving() || self.context.current_index == 0 {
                    return Transition::Ignored;
                }
                self.context.current_index -= 1;
                Transition::Changed
            }
            SessionEvent::Submit => {
                if !self.can_submit() {
                    return Transition::Ignored;
                }
                match self.state {
                    SessionState::ShortSession(_) => self.submit_short(),
                    SessionState::LongSession(LongPhase::Keywords)
                    | SessionState::LongSession(LongPhase::SubmitFailed { .. }) => {
                        self.submit_long()
                    }
                    _ => Transition::Ignored,
                }
            }
            SessionEvent::FinishFlips => {
                if self.state != SessionState::LongSession(LongPhase::Flips) || !self.can_submit()
                {
                    return Transition::Ignored;
                }
                self.finish_flips()
            }
            SessionEvent::StartLongSession => match self.state {
                SessionState::ShortSession(ShortPhase::Submitted) => {
                    self.state = SessionState::LongSession(LongPhase::Flips);
                    self.context.current_index = 0;
                    Transition::Changed
                }
                _ => Transition::Ignored,
            },
            SessionEvent::StartKeywordsQualification => match self.state {
                SessionState::LongSession(LongPhase::FinishedFlips) => {
                    self.state = SessionState::LongSession(LongPhase::Keywords);
                    self.context.current_index = 0;
                    Transition::Changed
                }
                _ => Transition::Ignored,
            },
            SessionEvent::DeadlineReached => self.deadline_reached(),
            SessionEvent::SubmissionSucceeded => {
                let next = match self.state {
                    SessionState::ShortSession(ShortPhase::Submitting) => {
                        SessionState::ShortSession(ShortPhase::Submitted)
                    }
                    // Past the long deadline keyword grading is skipped.
                    SessionState::LongSession(LongPhase::FinishingFlips)
                        if self.context.is_expired(SessionKind::Long) =>
                    {
                        self.context.last_error = None;
                        return self.submit_long();
                    }
                    SessionState::LongSession(LongPhase::FinishingFlips) => {
                        SessionState::LongSession(LongPhase::FinishedFlips)
                    }
                    SessionState::LongSession(LongPhase::Submitting) => {
                        SessionState::ValidationSucceeded
                    }
                    _ => return Transition::Ignored,
                };
                self.state = next;
                self.context.last_error = None;
                Transition::Changed
            }
            SessionEvent::SubmissionFailed { message } => {
                let next = match self.state {
                    SessionState::ShortSession(ShortPhase::Submitting) => {
                        SessionState::ShortSession(ShortPhase::SubmitFailed {
                            message: message.clone(),
                        })
                    }
                    SessionState::LongSession(LongPhase::FinishingFlips) => {
                        SessionState::LongSession(LongPhase::Flips)
                    }
                    SessionState::LongSession(LongPhase::Submitting) => {
                        SessionState::LongSession(LongPhase::SubmitFailed {
                            message: message.clone(),
                        })
                    }
                    _ => return Transition::Ignored,
                };
                warn!(state = self.state.path(), %message, "session submission failed");
                self.state = next;
                self.context.last_error = Some(message);
                Transition::Changed
            }
            SessionEvent::Fail { message } => {
                warn!(state = self.state.path(), %message, "session failed");
                self.state = SessionState::Failed { message };
                Transition::Changed
            }
        }
    }

    fn deadline_reached(&mut self) -> Transition {
        let kind = match self.active_kind() {
            Some(kind) => kind,
            None => return Transition::Ignored,
        };
        let newly_expired = !self.context.is_expired(kind);
        if newly_expired {
            self.context.expired.push(kind);
        }
        match self.state {
            SessionState::ShortSession(ShortPhase::Solve)
            | SessionState::ShortSession(ShortPhase::SubmitFailed { .. }) => self.submit_short(),
            SessionState::LongSession(LongPhase::Flips) => self.finish_flips(),
            SessionState::LongSession(LongPhase::FinishedFlips)
            | SessionState::LongSession(LongPhase::Keywords)
            | SessionState::LongSession(LongPhase::SubmitFailed { .. }) => self.submit_long(),
            _ if newly_expired => Transition::Changed,
            _ => Transition::Ignored,
        }
    }

    fn submit_short(&mut self) -> Transition {
        self.state = SessionState::ShortSession(ShortPhase::Submitting);
        Transition::Command(SessionCommand::SubmitShortSession {
            epoch: self.context.epoch,
            answers: self.context.answers(SessionKind::Short),
        })
    }

    fn finish_flips(&mut self) -> Transition {
        self.state = SessionState::LongSession(LongPhase::FinishingFlips);
        Transition::Command(SessionCommand::FinishFlips {
            epoch: self.context.epoch,
            answers: self.context.answers(SessionKind::Long),
        })
    }

    fn submit_long(&mut self) -> Transition {
        self.state = SessionState::LongSession(LongPhase::Submitting);
        Transition::Command(SessionCommand::SubmitLongSession {
            epoch: self.context.epoch,
            answers: self.context.answers(SessionKind::Long),
        })
    }
}

/// Pure form of [`ValidationSession::handle`]: returns the next session and
/// the transition, leaving `session` untouched.
pub fn transition(session: &ValidationSession, event: SessionEvent) -> (ValidationSession, Transition) {
    let mut next = session.clone();
    let outcome = next.handle(event);
    (next, outcome)
}
