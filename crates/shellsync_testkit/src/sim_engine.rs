//! A reference engine that owns the authoritative state.
//!
//! `SimEngine` issues revisions, keeps the full history so tests can compare
//! the mirror with the truth at any revision, and publishes updates only
//! when asked, so callers control delivery order.

use parking_lot::Mutex;
use shellsync_mirror::{Engine, MirrorError, MirrorResult, UpdateHandler};
use shellsync_protocol::{AppAction, AppState, AppUpdate, FieldValue, Revision, Secret};

struct Inner {
    history: Vec<AppState>,
    failing_pulls: usize,
    lagging_pulls: usize,
    lag: u64,
    pulls: usize,
    actions: Vec<AppAction>,
    secrets: Vec<(Revision, Secret)>,
}

// History always holds at least the initial state.
fn latest(inner: &Inner) -> &AppState {
    &inner.history[inner.history.len() - 1]
}

/// In-memory authoritative engine.
pub struct SimEngine {
    inner: Mutex<Inner>,
    handler: Mutex<Option<Box<dyn UpdateHandler>>>,
}

impl SimEngine {
    /// Creates an engine at revision 0 with empty state.
    pub fn new() -> Self {
        Self::with_initial(AppState::empty())
    }

    /// Creates an engine whose history starts at `initial`.
    pub fn with_initial(initial: AppState) -> Self {
        Self {
            inner: Mutex::new(Inner {
                history: vec![initial],
                failing_pulls: 0,
                lagging_pulls: 0,
                lag: 0,
                pulls: 0,
                actions: Vec::new(),
                secrets: Vec::new(),
            }),
            handler: Mutex::new(None),
        }
    }

    /// Returns the current authoritative state.
    pub fn current(&self) -> AppState {
        latest(&self.inner.lock()).clone()
    }

    /// Returns the current revision.
    pub fn rev(&self) -> Revision {
        latest(&self.inner.lock()).rev
    }

    /// Returns the state as of `rev`, if the history covers it.
    pub fn at(&self, rev: Revision) -> Option<AppState> {
        let inner = self.inner.lock();
        let base = inner.history.first().map_or(0, |s| s.rev.as_u64());
        let idx = rev.as_u64().checked_sub(base)?;
        inner.history.get(usize::try_from(idx).ok()?).cloned()
    }

    /// Replaces one field at the next revision and returns the delta.
    ///
    /// The delta is not published; see [`SimEngine::publish`].
    pub fn mutate(&self, value: FieldValue) -> AppUpdate {
        let mut inner = self.inner.lock();
        let mut next = latest(&inner).clone();
        next.rev = next.rev.next();
        next.set_field(value.clone());
        let rev = next.rev;
        inner.history.push(next);
        AppUpdate::field(rev, value)
    }

    /// Issues an "account created" side effect at the next revision.
    ///
    /// Only `rev` advances in state; the secret never enters a snapshot.
    pub fn create_account(&self, nsec: &str, pubkey: &str, npub: &str) -> AppUpdate {
        let mut inner = self.inner.lock();
        let mut next = latest(&inner).clone();
        next.rev = next.rev.next();
        let rev = next.rev;
        inner.history.push(next);
        inner.secrets.push((rev, Secret::new(nsec)));
        AppUpdate::account_created(rev, nsec, pubkey, npub)
    }

    /// Returns the full-state snapshot at the current revision as an update.
    pub fn snapshot_update(&self) -> AppUpdate {
        AppUpdate::FullState(self.current())
    }

    /// Delivers an update to the subscribed handler.
    ///
    /// Returns false if nothing is subscribed.
    pub fn publish(&self, update: AppUpdate) -> bool {
        match self.handler.lock().as_ref() {
            Some(handler) => {
                handler.on_update(update);
                true
            }
            None => false,
        }
    }

    /// Makes the next `count` pulls fail with a retryable error.
    pub fn fail_next_pulls(&self, count: usize) {
        self.inner.lock().failing_pulls = count;
    }

    /// Makes the next `count` pulls serve a snapshot `by` revisions old.
    pub fn lag_next_pulls(&self, count: usize, by: u64) {
        let mut inner = self.inner.lock();
        inner.lagging_pulls = count;
        inner.lag = by;
    }

    /// Returns the number of pulls served or failed.
    pub fn pull_count(&self) -> usize {
        self.inner.lock().pulls
    }

    /// Returns the dispatched actions.
    pub fn actions(&self) -> Vec<AppAction> {
        self.inner.lock().actions.clone()
    }

    /// Returns every secret issued, with its revision.
    pub fn issued_secrets(&self) -> Vec<(Revision, Secret)> {
        self.inner.lock().secrets.clone()
    }
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for SimEngine {
    fn pull_state(&self) -> MirrorResult<AppState> {
        let mut inner = self.inner.lock();
        inner.pulls += 1;
        if inner.failing_pulls > 0 {
            inner.failing_pulls -= 1;
            return Err(MirrorError::engine_retryable("simulated pull failure"));
        }
        if inner.lagging_pulls > 0 {
            inner.lagging_pulls -= 1;
            let len = inner.history.len();
            let back = usize::try_from(inner.lag).unwrap_or(usize::MAX).min(len - 1);
            return Ok(inner.history[len - 1 - back].clone());
        }
        Ok(latest(&inner).clone())
    }

    fn subscribe(&self, handler: Box<dyn UpdateHandler>) {
        *self.handler.lock() = Some(handler);
    }

    fn dispatch(&self, action: AppAction) {
        self.inner.lock().actions.push(action);
    }
}
