//! Async executor for session side effects, plus the publishing-status poller.
//!
//! The driver owns a [`ValidationSession`], feeds it events from a
//! [`SessionHandle`], runs the submissions it requests on the tokio runtime
//! and fires a forced submission once per phase when the deadline passes.
//! Dropping every handle tears the driver down: pending deadlines are
//! dropped with it, submissions already in flight run to completion.

use crate::error::StoreError;
use crate::flip::{Flip, FlipType};
use crate::session::{
    Answer, NavPosition, SessionCommand, SessionEvent, SessionKind, SessionState, SessionTimer,
    Transition, ValidationSession,
};
use crate::store::FlipStore;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio::select;
use tracing::{debug, info, warn};

/// Collaborator that delivers session answers to the node.
pub trait AnswerSubmitter: Send + Sync + 'static {
    /// Sends short-session answers.
    fn submit_short_session(
        &self,
        epoch: u64,
        answers: Vec<Answer>,
    ) -> impl Future<Output = Result<(), String>> + Send;

    /// Sends long-session flip answers before keyword grading.
    fn finish_flips(
        &self,
        epoch: u64,
        answers: Vec<Answer>,
    ) -> impl Future<Output = Result<(), String>> + Send;

    /// Sends the final long-session answers.
    fn submit_long_session(
        &self,
        epoch: u64,
        answers: Vec<Answer>,
    ) -> impl Future<Output = Result<(), String>> + Send;
}

/// What observers see after every processed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Active state.
    pub state: SessionState,
    /// Cursor into the active sequence.
    pub current_index: usize,
    /// Navigation sub-state.
    pub nav: Option<NavPosition>,
    /// Submit guard.
    pub can_submit: bool,
    /// Last submission error.
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    fn of(session: &ValidationSession) -> Self {
        Self {
            state: session.state().clone(),
            current_index: session.context().current_index,
            nav: session.nav(),
            can_submit: session.can_submit(),
            last_error: session.context().last_error.clone(),
        }
    }
}

/// Sending side of a running driver.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<SessionEvent>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Queues `event`; returns false once the driver has stopped.
    pub fn send(&self, event: SessionEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Waits until a snapshot satisfies `predicate`; `None` if the driver
    /// stopped first.
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> Option<SessionSnapshot>
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        loop {
            {
                let current = self.snapshots.borrow_and_update();
                if predicate(&current) {
                    return Some(current.clone());
                }
            }
            if self.snapshots.changed().await.is_err() {
                let last = self.snapshots.borrow();
                return predicate(&last).then(|| last.clone());
            }
        }
    }
}

/// Runs one session until it ends or every handle is dropped.
pub struct SessionDriver<S> {
    session: ValidationSession,
    timer: SessionTimer,
    submitter: Arc<S>,
    anchor_ms: u64,
    anchor: Instant,
    fired: Vec<SessionKind>,
}

impl<S: AnswerSubmitter> SessionDriver<S> {
    /// Driver for `session`, with the wall clock read from the system.
    pub fn new(session: ValidationSession, timer: SessionTimer, submitter: Arc<S>) -> Self {
        let anchor_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            session,
            timer,
            submitter,
            anchor_ms,
            anchor: Instant::now(),
            fired: Vec::new(),
        }
    }

    /// Pins the current wall-clock time to `now_ms`.
    pub fn with_now_ms(mut self, now_ms: u64) -> Self {
        self.anchor_ms = now_ms;
        self.anchor = Instant::now();
        self
    }

    /// Starts the driver on the current runtime.
    ///
    /// The join handle yields the session as it was when the driver stopped.
    pub fn spawn(self) -> (SessionHandle, JoinHandle<ValidationSession>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snap_tx, snap_rx) = watch::channel(SessionSnapshot::of(&self.session));
        let task = tokio::spawn(self.run(events_rx, snap_tx));
        (
            SessionHandle {
                events: events_tx,
                snapshots: snap_rx,
            },
            task,
        )
    }

    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
        snapshots: watch::Sender<SessionSnapshot>,
    ) -> ValidationSession {
        let (results_tx, mut results) = mpsc::unbounded_channel();
        while !self.session.state().is_terminal() {
            let deadline = self.next_deadline();
            select! {
                event = events.recv() => match event {
                    Some(event) => self.dispatch(event, &results_tx),
                    None => {
                        debug!(state = self.session.state().path(), "session driver torn down");
                        break;
                    }
                },
                Some(event) = results.recv() => self.dispatch(event, &results_tx),
                _ = sleep_until(deadline) => {
                    if let Some((kind, _)) = deadline {
                        self.fired.push(kind);
                        info!(?kind, state = self.session.state().path(), "session deadline reached");
                        self.dispatch(SessionEvent::DeadlineReached, &results_tx);
                    }
                }
            }
            snapshots.send_replace(SessionSnapshot::of(&self.session));
        }
        self.session
    }

    fn now_ms(&self) -> u64 {
        self.anchor_ms
            .saturating_add(self.anchor.elapsed().as_millis() as u64)
    }

    fn next_deadline(&self) -> Option<(SessionKind, Instant)> {
        let kind = self.session.active_kind()?;
        if self.fired.contains(&kind) {
            return None;
        }
        let remaining = self.timer.remaining(kind, self.now_ms());
        Some((kind, Instant::now() + remaining))
    }

    fn dispatch(&mut self, event: SessionEvent, results: &mpsc::UnboundedSender<SessionEvent>) {
        if let Transition::Command(command) = self.session.handle(event) {
            let submitter = Arc::clone(&self.submitter);
            let results = results.clone();
            tokio::spawn(async move {
                let event = match execute(submitter.as_ref(), command).await {
                    Ok(()) => SessionEvent::SubmissionSucceeded,
                    Err(message) => SessionEvent::SubmissionFailed { message },
                };
                // The driver may be gone; the outcome is then dropped.
                let _ = results.send(event);
            });
        }
    }
}

async fn execute<S: AnswerSubmitter>(submitter: &S, command: SessionCommand) -> Result<(), String> {
    match command {
        SessionCommand::SubmitShortSession { epoch, answers } => {
            submitter.submit_short_session(epoch, answers).await
        }
        SessionCommand::FinishFlips { epoch, answers } => submitter.finish_flips(epoch, answers).await,
        SessionCommand::SubmitLongSession { epoch, answers } => {
            submitter.submit_long_session(epoch, answers).await
        }
    }
}

async fn sleep_until(deadline: Option<(SessionKind, Instant)>) {
    match deadline {
        Some((_, at)) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Where the node says a flip stands.
pub trait FlipStatusSource: Send + Sync {
    /// Current type of the flip with network hash `hash`, if known.
    fn flip_status(&self, hash: &str) -> impl Future<Output = Option<FlipType>> + Send;
}

fn awaits_network(flip: &Flip) -> bool {
    matches!(flip.flip_type, FlipType::Publishing | FlipType::Deleting) && flip.hash.is_some()
}

/// Refreshes every Publishing or Deleting flip once; returns how many changed.
pub async fn poll_once<S, F>(store: &mut S, source: &F) -> Result<usize, StoreError>
where
    S: FlipStore + ?Sized,
    F: FlipStatusSource,
{
    let mut flips = store.get_flips()?;
    let mut updated = 0;
    for flip in flips.iter_mut().filter(|flip| awaits_network(flip)) {
        let hash = match flip.hash.clone() {
            Some(hash) => hash,
            None => continue,
        };
        let status = match source.flip_status(&hash).await {
            Some(status) => status,
            None => continue,
        };
        if status == flip.flip_type || !flip.flip_type.can_transition_to(status) {
            continue;
        }
        info!(%hash, from = %flip.flip_type, to = %status, "flip status updated");
        flip.flip_type = status;
        updated += 1;
    }
    if updated > 0 {
        store.save_flips(flips)?;
    }
    Ok(updated)
}

/// Polls flip status every `interval` until `shutdown` turns true or its
/// sender is dropped.
pub async fn watch_publishing_flips<S, F>(
    store: &mut S,
    source: &F,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    S: FlipStore + ?Sized,
    F: FlipStatusSource,
{
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    loop {
        select! {
            _ = ticker.tick() => {
                if let Err(err) = poll_once(store, source).await {
                    warn!(%err, "flip status poll failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("flip status poller stopped");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flip::tests::flip_with;
    use crate::session::{AnswerOption, SessionFlip, ShortPhase};
    use crate::store::MemoryFlipStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<Vec<Answer>>>,
        failures_left: AtomicUsize,
    }

    impl Recorder {
        fn failing(times: usize) -> Self {
            Self {
                failures_left: AtomicUsize::new(times),
                ..Self::default()
            }
        }

        fn record(&self, answers: Vec<Answer>) -> impl Future<Output = Result<(), String>> + Send {
            self.calls.lock().unwrap().push(answers);
            let fail = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            async move {
                time::sleep(Duration::from_secs(1)).await;
                if fail {
                    Err("node busy".to_string())
                } else {
                    Ok(())
                }
            }
        }

        fn count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl AnswerSubmitter for Recorder {
        fn submit_short_session(
            &self,
            _epoch: u64,
            answers: Vec<Answer>,
        ) -> impl Future<Output = Result<(), String>> + Send {
            self.record(answers)
        }

        fn finish_flips(
            &self,
            _epoch: u64,
            answers: Vec<Answer>,
        ) -> impl Future<Output = Result<(), String>> + Send {
            self.record(answers)
        }

        fn submit_long_session(
            &self,
            _epoch: u64,
            answers: Vec<Answer>,
        ) -> impl Future<Output = Result<(), String>> + Send {
            self.record(answers)
        }
    }

    fn started_session(count: usize) -> ValidationSession {
        let mut session = ValidationSession::new(9, 0);
        session.handle(SessionEvent::Start);
        session.handle(SessionEvent::FlipsFetched {
            kind: SessionKind::Short,
            flips: (0..count).map(|i| SessionFlip::ready(format!("0x{i}"))).collect(),
        });
        session
    }

    fn timer() -> SessionTimer {
        SessionTimer::new(0, Duration::from_secs(70), Duration::from_secs(300))
    }

    #[tokio::test(start_paused = true)]
    async fn double_submit_sends_once() {
        let recorder = Arc::new(Recorder::default());
        let driver = SessionDriver::new(started_session(1), timer(), Arc::clone(&recorder))
            .with_now_ms(0);
        let (mut handle, _task) = driver.spawn();
        assert!(handle.send(SessionEvent::Submit));
        assert!(handle.send(SessionEvent::Submit));
        let snap = handle
            .wait_for(|s| s.state == SessionState::ShortSession(ShortPhase::Submitted))
            .await
            .unwrap();
        assert!(!snap.can_submit);
        assert_eq!(recorder.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_forces_submission() {
        let recorder = Arc::new(Recorder::default());
        let driver = SessionDriver::new(started_session(3), timer(), Arc::clone(&recorder))
            .with_now_ms(0);
        let (mut handle, _task) = driver.spawn();
        handle.send(SessionEvent::Answer {
            option: AnswerOption::Left,
        });
        assert!(!handle.snapshot().can_submit);

        let started = Instant::now();
        handle
            .wait_for(|s| s.state == SessionState::ShortSession(ShortPhase::Submitted))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_secs(60));
        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0].option, Some(AnswerOption::Left));
        assert_eq!(calls[0][2].option, None);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_the_deadline() {
        let recorder = Arc::new(Recorder::default());
        let driver = SessionDriver::new(started_session(3), timer(), Arc::clone(&recorder))
            .with_now_ms(0);
        let (handle, task) = driver.spawn();
        drop(handle);
        let session = task.await.unwrap();
        assert_eq!(session.state(), &SessionState::ShortSession(ShortPhase::Solve));
        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(recorder.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_surfaces_and_retry_resubmits() {
        let recorder = Arc::new(Recorder::failing(1));
        let driver = SessionDriver::new(started_session(1), timer(), Arc::clone(&recorder))
            .with_now_ms(0);
        let (mut handle, _task) = driver.spawn();
        handle.send(SessionEvent::Answer {
            option: AnswerOption::Right,
        });
        handle.send(SessionEvent::Submit);
        let failed = handle
            .wait_for(|s| matches!(s.state, SessionState::ShortSession(ShortPhase::SubmitFailed { .. })))
            .await
            .unwrap();
        assert_eq!(failed.last_error.as_deref(), Some("node busy"));
        handle.send(SessionEvent::Submit);
        handle
            .wait_for(|s| s.state == SessionState::ShortSession(ShortPhase::Submitted))
            .await
            .unwrap();
        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn long_deadline_carries_the_session_to_the_end() {
        let recorder = Arc::new(Recorder::default());
        let driver = SessionDriver::new(started_session(1), timer(), Arc::clone(&recorder))
            .with_now_ms(0);
        let (mut handle, task) = driver.spawn();
        handle.send(SessionEvent::Submit);
        handle
            .wait_for(|s| s.state == SessionState::ShortSession(ShortPhase::Submitted))
            .await
            .unwrap();
        handle.send(SessionEvent::FlipsFetched {
            kind: SessionKind::Long,
            flips: vec![SessionFlip::ready("0xa"), SessionFlip::ready("0xb")],
        });
        handle.send(SessionEvent::StartLongSession);
        handle.send(SessionEvent::Answer {
            option: AnswerOption::Right,
        });

        let started = Instant::now();
        let done = handle
            .wait_for(|s| s.state == SessionState::ValidationSucceeded)
            .await
            .unwrap();
        assert!(done.last_error.is_none());
        assert!(started.elapsed() >= Duration::from_secs(300));
        let session = task.await.unwrap();
        assert_eq!(session.state(), &SessionState::ValidationSucceeded);

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1], calls[2]);
        assert_eq!(calls[2][0].option, Some(AnswerOption::Right));
        assert_eq!(calls[2][1].option, None);
    }

    struct FixedStatus(FlipType);

    impl FlipStatusSource for FixedStatus {
        fn flip_status(&self, _hash: &str) -> impl Future<Output = Option<FlipType>> + Send {
            let status = self.0;
            async move { Some(status) }
        }
    }

    #[tokio::test]
    async fn poll_moves_publishing_flips_forward() {
        let mut publishing = flip_with("a", FlipType::Publishing, 0);
        publishing.hash = Some("0xaa".into());
        let mut deleted = flip_with("b", FlipType::Deleted, 0);
        deleted.hash = Some("0xbb".into());
        let mut store = MemoryFlipStore::new(vec![publishing, deleted]);
        let updated = poll_once(&mut store, &FixedStatus(FlipType::Published))
            .await
            .unwrap();
        assert_eq!(updated, 1);
        let flips = store.get_flips().unwrap();
        assert_eq!(flips[0].flip_type, FlipType::Published);
        assert_eq!(flips[1].flip_type, FlipType::Deleted);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_stops_on_shutdown() {
        let mut publishing = flip_with("a", FlipType::Publishing, 0);
        publishing.hash = Some("0xaa".into());
        let mut store = MemoryFlipStore::new(vec![publishing]);
        let (stop_tx, stop_rx) = watch::channel(false);
        let stop = async move {
            time::sleep(Duration::from_secs(25)).await;
            stop_tx.send(true).unwrap();
        };
        let source = FixedStatus(FlipType::Invalid);
        tokio::join!(
            watch_publishing_flips(&mut store, &source, Duration::from_secs(10), stop_rx),
            stop
        );
        assert_eq!(store.get_flips().unwrap()[0].flip_type, FlipType::Invalid);
    }
}
