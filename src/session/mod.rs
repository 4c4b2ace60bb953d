//! Validation session state machine.
//!
//! A session moves `Idle → ShortSession → LongSession → ValidationSucceeded`,
//! with `Failed` reachable from any non-terminal state.  The machine is a
//! plain value: feed it [`SessionEvent`]s and execute the
//! [`SessionCommand`]s it returns.  The async executor lives in
//! `crate::driver`.

mod context;
mod machine;
mod state;
mod timer;

pub use context::{
    has_all_answers, has_all_relevance_marks, Answer, AnswerOption, Relevance, SessionContext,
    SessionFlip, SessionKind,
};
pub use machine::{transition, ValidationSession};
pub use state::{
    AnswerState, LongPhase, NavPosition, SessionCommand, SessionEvent, SessionState, ShortPhase,
    Transition,
};
pub use timer::{SessionTimer, DEFAULT_SUBMIT_GRACE_SECS};
