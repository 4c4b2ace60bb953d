//! Walks a validation session through both phases with a stub node.
//!
//! The short session is answered in full; the long session is left
//! incomplete and submitted by its deadline.  Run with
//! `cargo run --example validation_walkthrough` and `RUST_LOG=debug` to see
//! every transition.

use flip_ceremony::driver::{AnswerSubmitter, SessionDriver};
use flip_ceremony::session::{
    Answer, AnswerOption, LongPhase, Relevance, SessionEvent, SessionFlip, SessionKind,
    SessionState, SessionTimer, ShortPhase, ValidationSession,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

struct StubNode;

impl StubNode {
    fn log(
        &self,
        what: &'static str,
        epoch: u64,
        answers: Vec<Answer>,
    ) -> impl Future<Output = Result<(), String>> + Send {
        let answered = answers.iter().filter(|a| a.option.is_some()).count();
        println!("{what}: epoch {epoch}, {answered}/{} answered", answers.len());
        async { Ok(()) }
    }
}

impl AnswerSubmitter for StubNode {
    fn submit_short_session(
        &self,
        epoch: u64,
        answers: Vec<Answer>,
    ) -> impl Future<Output = Result<(), String>> + Send {
        self.log("short session", epoch, answers)
    }

    fn finish_flips(
        &self,
        epoch: u64,
        answers: Vec<Answer>,
    ) -> impl Future<Output = Result<(), String>> + Send {
        self.log("long session flips", epoch, answers)
    }

    fn submit_long_session(
        &self,
        epoch: u64,
        answers: Vec<Answer>,
    ) -> impl Future<Output = Result<(), String>> + Send {
        self.log("long session", epoch, answers)
    }
}

fn flips(prefix: &str, count: usize) -> Vec<SessionFlip> {
    (0..count)
        .map(|i| SessionFlip::ready(format!("0x{prefix}{i}")))
        .collect()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let timer = SessionTimer::new(0, Duration::from_secs(12), Duration::from_secs(2));
    let driver = SessionDriver::new(ValidationSession::new(7, 0), timer, Arc::new(StubNode))
        .with_now_ms(0);
    let (mut handle, task) = driver.spawn();

    handle.send(SessionEvent::Start);
    handle.send(SessionEvent::FlipsFetched {
        kind: SessionKind::Short,
        flips: flips("s", 3),
    });
    for option in [AnswerOption::Left, AnswerOption::Right, AnswerOption::Left] {
        handle.send(SessionEvent::Answer { option });
        handle.send(SessionEvent::Next);
    }
    handle.send(SessionEvent::Submit);
    handle
        .wait_for(|s| s.state == SessionState::ShortSession(ShortPhase::Submitted))
        .await;

    handle.send(SessionEvent::FlipsFetched {
        kind: SessionKind::Long,
        flips: flips("l", 4),
    });
    handle.send(SessionEvent::StartLongSession);
    handle.send(SessionEvent::Answer {
        option: AnswerOption::Right,
    });
    handle.send(SessionEvent::Pick { index: 3 });
    handle.send(SessionEvent::FinishFlips);
    handle
        .wait_for(|s| s.state == SessionState::LongSession(LongPhase::FinishedFlips))
        .await;
    handle.send(SessionEvent::StartKeywordsQualification);
    handle.send(SessionEvent::ToggleWords {
        relevance: Relevance::Relevant,
    });

    println!("waiting for the long-session deadline");
    let done = handle
        .wait_for(|s| s.state == SessionState::ValidationSucceeded)
        .await;
    println!("final state: {:?}", done.map(|s| s.state));
    drop(handle);
    let _ = task.await;
}
