//! Engine collaborator abstraction.

use crate::error::{MirrorError, MirrorResult};
use parking_lot::{Condvar, Mutex};
use shellsync_protocol::{AppAction, AppState, AppUpdate};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Receives updates pushed by the engine.
///
/// Called from whatever thread the engine publishes on; implementations must
/// hand the update off rather than reconcile in place.
pub trait UpdateHandler: Send + Sync + 'static {
    /// Delivers one update.
    fn on_update(&self, update: AppUpdate);
}

impl<F> UpdateHandler for F
where
    F: Fn(AppUpdate) + Send + Sync + 'static,
{
    fn on_update(&self, update: AppUpdate) {
        self(update)
    }
}

/// The authoritative state owner.
///
/// This trait abstracts the engine, allowing for different implementations
/// (an in-process core, an FFI bridge, mocks for testing, etc.).
pub trait Engine: Send + Sync + 'static {
    /// Returns the current full state. May block; may fail.
    fn pull_state(&self) -> MirrorResult<AppState>;

    /// Registers the handler that receives every pushed update.
    fn subscribe(&self, handler: Box<dyn UpdateHandler>);

    /// Sends a fire-and-forget command.
    fn dispatch(&self, action: AppAction);
}

#[derive(Default)]
struct MockInner {
    snapshot: AppState,
    scripted: VecDeque<MirrorResult<AppState>>,
    held: bool,
    pulls: usize,
    actions: Vec<AppAction>,
}

/// A scripted engine for testing.
///
/// Pulls return queued responses first and the current snapshot otherwise.
/// Pulls can be held at a gate so a test can interleave pushed updates with
/// an outstanding resync.
#[derive(Default)]
pub struct MockEngine {
    inner: Mutex<MockInner>,
    changed: Condvar,
    handler: Mutex<Option<Box<dyn UpdateHandler>>>,
}

impl MockEngine {
    /// Creates a mock engine serving `snapshot`.
    pub fn new(snapshot: AppState) -> Self {
        Self {
            inner: Mutex::new(MockInner {
                snapshot,
                ..MockInner::default()
            }),
            changed: Condvar::new(),
            handler: Mutex::new(None),
        }
    }

    /// Replaces the snapshot served by unscripted pulls.
    pub fn set_snapshot(&self, snapshot: AppState) {
        self.inner.lock().snapshot = snapshot;
    }

    /// Queues a response for the next pull.
    pub fn push_pull_response(&self, response: MirrorResult<AppState>) {
        self.inner.lock().scripted.push_back(response);
    }

    /// Queues `count` retryable pull failures.
    pub fn fail_next_pulls(&self, count: usize) {
        let mut inner = self.inner.lock();
        for _ in 0..count {
            inner
                .scripted
                .push_back(Err(MirrorError::engine_retryable("engine unavailable")));
        }
    }

    /// Makes subsequent pulls block until [`MockEngine::release_pulls`].
    pub fn hold_pulls(&self) {
        self.inner.lock().held = true;
    }

    /// Lets held pulls proceed.
    pub fn release_pulls(&self) {
        self.inner.lock().held = false;
        self.changed.notify_all();
    }

    /// Returns the number of pulls started so far.
    pub fn pull_count(&self) -> usize {
        self.inner.lock().pulls
    }

    /// Waits until at least `count` pulls have started.
    pub fn wait_for_pulls(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while inner.pulls < count {
            if self.changed.wait_until(&mut inner, deadline).timed_out() {
                return inner.pulls >= count;
            }
        }
        true
    }

    /// Returns the actions dispatched so far.
    pub fn actions(&self) -> Vec<AppAction> {
        self.inner.lock().actions.clone()
    }

    /// Returns true once a handler has subscribed.
    pub fn is_subscribed(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Pushes an update through the subscribed handler.
    ///
    /// Returns false if nothing is subscribed.
    pub fn emit(&self, update: AppUpdate) -> bool {
        match self.handler.lock().as_ref() {
            Some(handler) => {
                handler.on_update(update);
                true
            }
            None => false,
        }
    }
}

impl Engine for MockEngine {
    fn pull_state(&self) -> MirrorResult<AppState> {
        let mut inner = self.inner.lock();
        inner.pulls += 1;
        self.changed.notify_all();
        while inner.held {
            self.changed.wait(&mut inner);
        }
        match inner.scripted.pop_front() {
            Some(response) => response,
            None => Ok(inner.snapshot.clone()),
        }
    }

    fn subscribe(&self, handler: Box<dyn UpdateHandler>) {
        *self.handler.lock() = Some(handler);
    }

    fn dispatch(&self, action: AppAction) {
        self.inner.lock().actions.push(action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shellsync_protocol::{FieldValue, Revision};
    use std::sync::mpsc;
    use std::sync::Arc;

    #[test]
    fn scripted_responses_come_first() {
        let mut snapshot = AppState::empty();
        snapshot.rev = Revision(4);
        let engine = MockEngine::new(snapshot.clone());
        engine.fail_next_pulls(1);

        assert!(engine.pull_state().unwrap_err().is_retryable());
        assert_eq!(engine.pull_state().unwrap(), snapshot);
        assert_eq!(engine.pull_count(), 2);
    }

    #[test]
    fn emit_requires_subscriber() {
        let engine = MockEngine::new(AppState::empty());
        assert!(!engine.emit(AppUpdate::field(1, FieldValue::Toast(None))));

        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        engine.subscribe(Box::new(move |update: AppUpdate| {
            let _ = tx.lock().send(update);
        }));
        assert!(engine.is_subscribed());
        assert!(engine.emit(AppUpdate::field(1, FieldValue::Toast(None))));
        assert_eq!(rx.recv().unwrap().rev(), Revision(1));
    }

    #[test]
    fn held_pulls_wait_for_release() {
        let engine = Arc::new(MockEngine::new(AppState::empty()));
        engine.hold_pulls();

        let worker = {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.pull_state())
        };
        assert!(engine.wait_for_pulls(1, Duration::from_secs(5)));
        assert!(!worker.is_finished());

        engine.release_pulls();
        assert!(worker.join().unwrap().is_ok());
    }

    #[test]
    fn dispatch_is_recorded() {
        let engine = MockEngine::new(AppState::empty());
        engine.dispatch(AppAction::ClearToast);
        engine.dispatch(AppAction::Foregrounded);
        assert_eq!(
            engine.actions(),
            vec![AppAction::ClearToast, AppAction::Foregrounded]
        );
    }
}
