//! Deterministic single-threaded reconciliation harness.
//!
//! The harness plays the role of the mirror's serialization context: the
//! test decides when each update is delivered and when each outstanding
//! pull completes. Repull delays are ignored.

use crate::sim_engine::SimEngine;
use shellsync_mirror::{
    ClientMirror, Engine, FailureOutcome, MemorySecretStore, MirrorConfig, MirrorResult,
    PullOutcome, ResyncTicket, SecretStore, UpdateOutcome,
};
use shellsync_protocol::{AppState, AppUpdate, Revision, UpdateKind};
use std::collections::VecDeque;
use std::sync::Arc;

/// One delivered update and what the mirror did with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Revision of the update.
    pub rev: Revision,
    /// Kind of the update.
    pub kind: UpdateKind,
    /// Mirror decision.
    pub outcome: UpdateOutcome,
    /// Mirror position after handling it.
    pub last_applied: Revision,
}

/// Result of completing one outstanding pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullStep {
    /// The engine served a snapshot.
    Completed(PullOutcome),
    /// The engine failed.
    Failed(FailureOutcome),
}

/// Result of [`ReconcileHarness::settle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleReport {
    /// Pulls completed or failed while settling.
    pub pulls: usize,
    /// True if no pull is outstanding afterwards.
    pub settled: bool,
}

/// Drives a [`ClientMirror`] against a [`SimEngine`] step by step.
pub struct ReconcileHarness {
    engine: Arc<SimEngine>,
    store: Arc<dyn SecretStore>,
    mirror: ClientMirror,
    pending: VecDeque<ResyncTicket>,
    deliveries: Vec<Delivery>,
}

impl ReconcileHarness {
    /// Seeds a mirror from the engine's current snapshot, with an in-memory
    /// secret store.
    pub fn new(engine: Arc<SimEngine>) -> MirrorResult<Self> {
        Self::with_store(engine, Arc::new(MemorySecretStore::new()))
    }

    /// Seeds a mirror using the given secret store.
    pub fn with_store(engine: Arc<SimEngine>, store: Arc<dyn SecretStore>) -> MirrorResult<Self> {
        let initial = engine.pull_state()?;
        Ok(Self {
            engine,
            store,
            mirror: ClientMirror::with_config(initial, MirrorConfig::default()),
            pending: VecDeque::new(),
            deliveries: Vec::new(),
        })
    }

    /// Returns the engine.
    pub fn engine(&self) -> &SimEngine {
        &self.engine
    }

    /// Returns the mirror.
    pub fn mirror(&self) -> &ClientMirror {
        &self.mirror
    }

    /// Returns the secret store.
    pub fn store(&self) -> &dyn SecretStore {
        self.store.as_ref()
    }

    /// Returns every delivery so far.
    pub fn deliveries(&self) -> &[Delivery] {
        &self.deliveries
    }

    /// Hands one update to the mirror.
    pub fn deliver(&mut self, update: AppUpdate) -> UpdateOutcome {
        let rev = update.rev();
        let kind = update.kind();
        let outcome = self.mirror.on_update(update, self.store.as_ref());
        if let UpdateOutcome::ResyncStarted(ticket) = outcome {
            self.pending.push_back(ticket);
        }
        self.deliveries.push(Delivery {
            rev,
            kind,
            outcome,
            last_applied: self.mirror.last_applied(),
        });
        outcome
    }

    /// Hands several updates to the mirror, in order.
    pub fn deliver_all<I>(&mut self, updates: I) -> Vec<UpdateOutcome>
    where
        I: IntoIterator<Item = AppUpdate>,
    {
        updates.into_iter().map(|u| self.deliver(u)).collect()
    }

    /// Forces a resync, as a foregrounded app would.
    pub fn request_resync(&mut self) -> Option<ResyncTicket> {
        let ticket = self.mirror.request_resync()?;
        self.pending.push_back(ticket);
        Some(ticket)
    }

    /// Returns the outstanding pull, if any.
    pub fn pending_pull(&self) -> Option<ResyncTicket> {
        self.pending.front().copied()
    }

    /// Completes the outstanding pull with whatever the engine serves now.
    pub fn complete_pull(&mut self) -> Option<PullStep> {
        let ticket = self.pending.pop_front()?;
        let step = match self.engine.pull_state() {
            Ok(snapshot) => PullStep::Completed(self.finish(ticket, snapshot)),
            Err(e) => PullStep::Failed(self.mirror.on_pull_failed(ticket, &e)),
        };
        Some(step)
    }

    /// Completes the outstanding pull with a chosen snapshot.
    pub fn complete_pull_with(&mut self, snapshot: AppState) -> Option<PullOutcome> {
        let ticket = self.pending.pop_front()?;
        Some(self.finish(ticket, snapshot))
    }

    /// Completes pulls until none is outstanding or `max_pulls` ran.
    pub fn settle(&mut self, max_pulls: usize) -> SettleReport {
        let mut pulls = 0;
        while pulls < max_pulls && self.complete_pull().is_some() {
            pulls += 1;
        }
        SettleReport {
            pulls,
            settled: self.pending.is_empty(),
        }
    }

    /// Returns true if the mirror matches the engine exactly.
    pub fn converged(&self) -> bool {
        self.pending.is_empty()
            && self.mirror.last_applied() == self.engine.rev()
            && self.mirror.state() == &self.engine.current()
    }

    fn finish(&mut self, ticket: ResyncTicket, snapshot: AppState) -> PullOutcome {
        let outcome = self.mirror.on_pull_complete(ticket, snapshot);
        if let PullOutcome::Repull { ticket, .. } = outcome {
            self.pending.push_back(ticket);
        }
        outcome
    }
}
