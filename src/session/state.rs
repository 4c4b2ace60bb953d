//! Session states, events and commands.

use super::context::{Answer, AnswerOption, Relevance, SessionFlip, SessionKind};
use serde::{Deserialize, Serialize};

/// Short-session phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShortPhase {
    /// Answering flip pairs.
    Solve,
    /// Answers handed to the collaborator, awaiting the outcome.
    Submitting,
    /// Last submission failed; answering and retrying stay possible.
    SubmitFailed {
        /// Failure message.
        message: String,
    },
    /// Answers accepted; the qualification dialog is showing.
    Submitted,
}

/// Long-session phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LongPhase {
    /// Answering flip pairs.
    Flips,
    /// Flip answers handed over before keyword grading.
    FinishingFlips,
    /// Flip answers accepted; the keyword dialog is showing.
    FinishedFlips,
    /// Grading keyword relevance.
    Keywords,
    /// Final answers handed over, awaiting the outcome.
    Submitting,
    /// Last submission failed; grading and retrying stay possible.
    SubmitFailed {
        /// Failure message.
        message: String,
    },
}

/// Top-level session state.  Exactly one leaf is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Not started.
    Idle,
    /// First phase.
    ShortSession(ShortPhase),
    /// Second phase.
    LongSession(LongPhase),
    /// All answers accepted.
    ValidationSucceeded,
    /// Unrecoverable failure.
    Failed {
        /// Failure message.
        message: String,
    },
}

impl SessionState {
    /// Phase kind while inside a session.
    pub fn kind(&self) -> Option<SessionKind> {
        match self {
            Self::ShortSession(_) => Some(SessionKind::Short),
            Self::LongSession(_) => Some(SessionKind::Long),
            _ => None,
        }
    }

    /// Returns true for states nothing leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ValidationSucceeded | Self::Failed { .. })
    }

    /// Returns true while a submission is in flight.
    pub fn is_submitting(&self) -> bool {
        matches!(
            self,
            Self::ShortSession(ShortPhase::Submitting)
                | Self::LongSession(LongPhase::FinishingFlips)
                | Self::LongSession(LongPhase::Submitting)
        )
    }

    /// Returns true in the phases that show flips and accept navigation.
    pub fn is_solving(&self) -> bool {
        match self {
            Self::ShortSession(phase) => !matches!(phase, ShortPhase::Submitted),
            Self::LongSession(phase) => !matches!(phase, LongPhase::FinishedFlips),
            _ => false,
        }
    }

    /// Dotted path of the active leaf, e.g. `shortSession.solve.answer.submitShortSession.pending`.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ShortSession(ShortPhase::Solve) => "shortSession.solve.answer",
            Self::ShortSession(ShortPhase::Submitting) => {
                "shortSession.solve.answer.submitShortSession.pending"
            }
            Self::ShortSession(ShortPhase::SubmitFailed { .. }) => {
                "shortSession.solve.answer.submitShortSession.failed"
            }
            Self::ShortSession(ShortPhase::Submitted) => {
                "shortSession.solve.answer.submitShortSession.done"
            }
            Self::LongSession(LongPhase::Flips) => "longSession.solve.answer.flips",
            Self::LongSession(LongPhase::FinishingFlips) => {
                "longSession.solve.answer.finishFlips.pending"
            }
            Self::LongSession(LongPhase::FinishedFlips) => {
                "longSession.solve.answer.finishFlips.done"
            }
            Self::LongSession(LongPhase::Keywords) => "longSession.solve.answer.keywords",
            Self::LongSession(LongPhase::Submitting) => {
                "longSession.solve.answer.submitLongSession.pending"
            }
            Self::LongSession(LongPhase::SubmitFailed { .. }) => {
                "longSession.solve.answer.submitLongSession.failed"
            }
            Self::ValidationSucceeded => "validationSucceeded",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Cursor position within the active sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavPosition {
    /// At index 0 with more flips after it.
    FirstFlip,
    /// Somewhere in between.
    MidFlip,
    /// At the last flip, or the sequence has at most one flip.
    LastFlip,
}

/// Whether the current flip carries a mark for the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerState {
    /// No answer or relevance mark yet.
    Unanswered,
    /// Marked.
    Answered,
}

/// Inputs to the session machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Enter the short session.
    Start,
    /// Replace the flip list of `kind`, keeping marks by hash.
    FlipsFetched {
        /// Target list.
        kind: SessionKind,
        /// New records.
        flips: Vec<SessionFlip>,
    },
    /// A flip finished loading and decoding.
    FlipDecoded {
        /// Target list.
        kind: SessionKind,
        /// Flip hash.
        hash: String,
        /// Decoded images.
        images: Vec<String>,
    },
    /// Pick a side for the current flip.
    Answer {
        /// Chosen side.
        option: AnswerOption,
    },
    /// Jump to `index` in the active sequence.
    Pick {
        /// Target position.
        index: usize,
    },
    /// Move one flip forward.
    Next,
    /// Move one flip back.
    Prev,
    /// Grade the keywords of the current flip.
    ToggleWords {
        /// Relevance mark.
        relevance: Relevance,
    },
    /// Submit the answers of the current phase.
    Submit,
    /// End long-session flip answering and move to keyword grading.
    FinishFlips,
    /// Acknowledge the qualification dialog.
    StartLongSession,
    /// Acknowledge the keyword dialog.
    StartKeywordsQualification,
    /// The phase deadline passed; submit whatever is there.
    DeadlineReached,
    /// The in-flight submission resolved.
    SubmissionSucceeded,
    /// The in-flight submission rejected.
    SubmissionFailed {
        /// Failure message.
        message: String,
    },
    /// Unrecoverable failure from a collaborator.
    Fail {
        /// Failure message.
        message: String,
    },
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Send short-session answers.
    SubmitShortSession {
        /// Validation epoch.
        epoch: u64,
        /// Answers for every non-spare flip.
        answers: Vec<Answer>,
    },
    /// Send long-session flip answers before keyword grading.
    FinishFlips {
        /// Validation epoch.
        epoch: u64,
        /// Answers for every non-spare flip.
        answers: Vec<Answer>,
    },
    /// Send the final long-session answers and relevance marks.
    SubmitLongSession {
        /// Validation epoch.
        epoch: u64,
        /// Answers for every non-spare flip.
        answers: Vec<Answer>,
    },
}

/// Outcome of feeding one event to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The event does not apply in the current state.
    Ignored,
    /// State or context changed; nothing to execute.
    Changed,
    /// State changed and `SessionCommand` must be executed.
    Command(SessionCommand),
}
