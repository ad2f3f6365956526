//! Threaded runtime around [`ClientMirror`].
//!
//! One actor thread owns the mirror and is the only writer. Engine pushes,
//! pull completions and resync requests all arrive on one channel, so they
//! are handled strictly one at a time. Snapshot pulls run on short-lived
//! worker threads and report back through the same channel.
//!
//! Readers see a published copy of the mirror behind a `RwLock`.

use crate::config::MirrorConfig;
use crate::engine::{Engine, UpdateHandler};
use crate::error::{MirrorError, MirrorResult};
use crate::mirror::{ClientMirror, MirrorStats, PullOutcome, UpdateOutcome};
use crate::pull::{pull_with_retry, sleep_unless_cancelled};
use crate::resync::ResyncTicket;
use crate::secret_store::SecretStore;
use crate::session::SessionTracker;
use parking_lot::{Condvar, Mutex, RwLock};
use shellsync_protocol::{AppAction, AppState, AppUpdate, Revision, Secret};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

enum Event {
    Update(AppUpdate),
    PullFinished {
        ticket: ResyncTicket,
        result: MirrorResult<AppState>,
    },
    ResyncNow,
    Shutdown,
}

struct ChannelHandler {
    tx: Sender<Event>,
}

impl UpdateHandler for ChannelHandler {
    fn on_update(&self, update: AppUpdate) {
        // The actor is gone after shutdown; late pushes are dropped.
        let _ = self.tx.send(Event::Update(update));
    }
}

struct View {
    state: AppState,
    last_applied: Revision,
    resync_in_flight: bool,
    stats: MirrorStats,
}

impl View {
    fn of(mirror: &ClientMirror) -> Self {
        Self {
            state: mirror.state().clone(),
            last_applied: mirror.last_applied(),
            resync_in_flight: mirror.resync_in_flight(),
            stats: mirror.stats().clone(),
        }
    }
}

struct Shared {
    view: RwLock<View>,
    published: Mutex<Revision>,
    published_changed: Condvar,
    watchers: Mutex<Vec<Sender<()>>>,
    session: Mutex<SessionTracker>,
    cancelled: AtomicBool,
}

impl Shared {
    fn publish(&self, mirror: &ClientMirror, changed: bool) {
        *self.view.write() = View::of(mirror);
        if !changed {
            return;
        }
        *self.published.lock() = mirror.last_applied();
        self.published_changed.notify_all();
        self.watchers.lock().retain(|tx| tx.send(()).is_ok());
    }
}

/// Runs a [`ClientMirror`] against a live engine.
pub struct MirrorManager {
    engine: Arc<dyn Engine>,
    store: Arc<dyn SecretStore>,
    shared: Arc<Shared>,
    events: Sender<Event>,
    actor: Mutex<Option<JoinHandle<()>>>,
}

impl MirrorManager {
    /// Subscribes to the engine, pulls the initial snapshot and starts the
    /// actor.
    ///
    /// Updates pushed while the initial pull runs are queued and reconciled
    /// against the snapshot once the actor starts.
    pub fn start(
        engine: Arc<dyn Engine>,
        store: Arc<dyn SecretStore>,
        config: MirrorConfig,
    ) -> MirrorResult<Self> {
        config.validate()?;

        let (tx, rx) = mpsc::channel();
        engine.subscribe(Box::new(ChannelHandler { tx: tx.clone() }));

        let cancelled = AtomicBool::new(false);
        let initial_retry = config
            .retry
            .clone()
            .with_max_attempts(Some(config.initial_pull_attempts));
        let initial = pull_with_retry(engine.as_ref(), &initial_retry, &cancelled)?;
        tracing::info!(rev = %initial.rev, "initial snapshot pulled");

        let mirror = ClientMirror::with_config(initial, config);
        let mut session = SessionTracker::new();
        let restore = session.start(store.as_ref());
        session.on_state(mirror.state(), store.as_ref());

        let shared = Arc::new(Shared {
            view: RwLock::new(View::of(&mirror)),
            published: Mutex::new(mirror.last_applied()),
            published_changed: Condvar::new(),
            watchers: Mutex::new(Vec::new()),
            session: Mutex::new(session),
            cancelled,
        });

        let actor = Actor {
            mirror,
            engine: Arc::clone(&engine),
            store: Arc::clone(&store),
            shared: Arc::clone(&shared),
            tx: tx.clone(),
        };
        let handle = std::thread::Builder::new()
            .name("shellsync-mirror".into())
            .spawn(move || actor.run(rx))?;

        if let Some(action) = restore {
            engine.dispatch(action);
        }

        Ok(Self {
            engine,
            store,
            shared,
            events: tx,
            actor: Mutex::new(Some(handle)),
        })
    }

    /// Returns a copy of the mirrored state.
    pub fn state(&self) -> AppState {
        self.shared.view.read().state.clone()
    }

    /// Returns the last applied revision.
    pub fn last_applied(&self) -> Revision {
        self.shared.view.read().last_applied
    }

    /// Returns true while a snapshot pull is outstanding.
    pub fn is_resync_in_flight(&self) -> bool {
        self.shared.view.read().resync_in_flight
    }

    /// Returns a copy of the counters.
    pub fn stats(&self) -> MirrorStats {
        self.shared.view.read().stats.clone()
    }

    /// Subscribes to change notifications.
    ///
    /// One `()` is sent after every event that advanced the mirror.
    pub fn subscribe_changes(&self) -> Receiver<()> {
        let (tx, rx) = mpsc::channel();
        self.shared.watchers.lock().push(tx);
        rx
    }

    /// Blocks until the mirror reaches `rev` or `timeout` passes.
    pub fn wait_for_rev(&self, rev: Revision, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut published = self.shared.published.lock();
        while *published < rev {
            if self
                .shared
                .published_changed
                .wait_until(&mut published, deadline)
                .timed_out()
            {
                return *published >= rev;
            }
        }
        true
    }

    /// Requests a snapshot pull, coalescing with one already in flight.
    pub fn resync_now(&self) -> MirrorResult<()> {
        self.events
            .send(Event::ResyncNow)
            .map_err(|_| MirrorError::Disconnected)
    }

    /// Forwards an action to the engine.
    ///
    /// `Foregrounded` also requests a resync, since pushes may have been
    /// missed while the app was suspended.
    pub fn dispatch(&self, action: AppAction) {
        if action == AppAction::Foregrounded {
            if let Err(e) = self.resync_now() {
                tracing::debug!(error = %e, "resync on foreground skipped");
            }
        }
        tracing::debug!(action = action.name(), "dispatch");
        self.engine.dispatch(action);
    }

    /// Logs in with a private key. The key is stored once the login succeeds.
    pub fn login(&self, nsec: impl Into<Secret>) {
        let action = self.shared.session.lock().login(nsec.into());
        self.engine.dispatch(action);
    }

    /// Clears the stored key and logs out.
    pub fn logout(&self) {
        let action = self.shared.session.lock().logout(self.store.as_ref());
        self.engine.dispatch(action);
    }

    /// Returns true while a stored key is being used to restore the session.
    pub fn is_restoring_session(&self) -> bool {
        self.shared.session.lock().is_restoring()
    }

    /// Stops the actor and any pulls waiting to retry.
    pub fn shutdown(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
        let Some(handle) = self.actor.lock().take() else {
            return;
        };
        let _ = self.events.send(Event::Shutdown);
        if handle.join().is_err() {
            tracing::warn!("mirror actor panicked");
        }
    }
}

impl Drop for MirrorManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Actor {
    mirror: ClientMirror,
    engine: Arc<dyn Engine>,
    store: Arc<dyn SecretStore>,
    shared: Arc<Shared>,
    tx: Sender<Event>,
}

impl Actor {
    fn run(mut self, rx: Receiver<Event>) {
        while let Ok(event) = rx.recv() {
            let before = self.mirror.last_applied();
            match event {
                Event::Update(update) => self.on_update(update),
                Event::PullFinished { ticket, result } => self.on_pull_finished(ticket, result),
                Event::ResyncNow => {
                    if let Some(ticket) = self.mirror.request_resync() {
                        self.spawn_pull(ticket, Duration::ZERO);
                    }
                }
                Event::Shutdown => break,
            }

            let changed = self.mirror.last_applied() != before;
            if changed {
                self.shared
                    .session
                    .lock()
                    .on_state(self.mirror.state(), self.store.as_ref());
            }
            self.shared.publish(&self.mirror, changed);
        }
        tracing::debug!(rev = %self.mirror.last_applied(), "mirror actor stopped");
    }

    fn on_update(&mut self, update: AppUpdate) {
        let account_created = update.secret_payload().is_some();
        match self.mirror.on_update(update, self.store.as_ref()) {
            UpdateOutcome::Applied if account_created => {
                self.shared.session.lock().on_account_created();
            }
            UpdateOutcome::ResyncStarted(ticket) => self.spawn_pull(ticket, Duration::ZERO),
            _ => {}
        }
    }

    fn on_pull_finished(&mut self, ticket: ResyncTicket, result: MirrorResult<AppState>) {
        match result {
            Ok(snapshot) => {
                if let PullOutcome::Repull { ticket, delay } =
                    self.mirror.on_pull_complete(ticket, snapshot)
                {
                    self.spawn_pull(ticket, delay);
                }
            }
            Err(MirrorError::Cancelled) => {}
            Err(e) => {
                self.mirror.on_pull_failed(ticket, &e);
            }
        }
    }

    fn spawn_pull(&mut self, ticket: ResyncTicket, delay: Duration) {
        let engine = Arc::clone(&self.engine);
        let shared = Arc::clone(&self.shared);
        let tx = self.tx.clone();
        let retry = self.mirror.config().retry.clone();

        let spawned = std::thread::Builder::new()
            .name(format!("shellsync-pull-{}", ticket.session))
            .spawn(move || {
                let result = sleep_unless_cancelled(delay, &shared.cancelled)
                    .and_then(|()| pull_with_retry(engine.as_ref(), &retry, &shared.cancelled));
                let _ = tx.send(Event::PullFinished { ticket, result });
            });
        if let Err(e) = spawned {
            self.mirror.on_pull_failed(ticket, &MirrorError::Io(e));
        }
    }
}
