//! The client mirror: gate, merger, extractor and coordinator composed.
//!
//! `ClientMirror` is sans-IO. It never pulls, sleeps or spawns; it tells the
//! caller what to do (issue a pull, repull after a delay) and expects the
//! results to be fed back in through [`ClientMirror::on_pull_complete`] and
//! [`ClientMirror::on_pull_failed`]. All methods take `&mut self`, so the
//! serialization the protocol needs is whatever owns the mirror.

use crate::config::MirrorConfig;
use crate::error::MirrorError;
use crate::extractor::{self, ExtractOutcome};
use crate::gate::{self, DropReason, GateDecision};
use crate::merger;
use crate::resync::{Completion, ResyncCoordinator, ResyncTicket};
use crate::secret_store::SecretStore;
use serde::Serialize;
use shellsync_protocol::{AppState, AppUpdate, Revision};
use std::fmt;
use std::time::Duration;

/// Result of [`ClientMirror::on_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update was merged into the mirror.
    Applied,
    /// The update was not merged.
    Dropped(DropReason),
    /// A gap was detected; the caller must pull a snapshot for this ticket.
    ResyncStarted(ResyncTicket),
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::Applied => f.write_str("applied"),
            UpdateOutcome::Dropped(DropReason::Stale) => f.write_str("dropped_stale"),
            UpdateOutcome::Dropped(DropReason::ResyncInFlight) => {
                f.write_str("dropped_in_flight")
            }
            UpdateOutcome::ResyncStarted(ticket) => write!(f, "resync_started({ticket})"),
        }
    }
}

/// Result of [`ClientMirror::on_pull_complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// The mirror caught up; no pull outstanding.
    Settled,
    /// The snapshot was older than traffic seen mid-pull; pull again.
    Repull {
        /// Ticket for the next pull.
        ticket: ResyncTicket,
        /// How long to wait before issuing it.
        delay: Duration,
    },
    /// The completion did not belong to the outstanding pull.
    Ignored,
}

/// Result of [`ClientMirror::on_pull_failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The resync gave up; the next update or request restarts it.
    Stalled,
    /// The failure did not belong to the outstanding pull.
    Ignored,
}

/// Counters describing what the mirror has done.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MirrorStats {
    /// Updates handed to [`ClientMirror::on_update`].
    pub updates_received: u64,
    /// Updates merged.
    pub updates_applied: u64,
    /// Updates at or below the last applied revision.
    pub dropped_stale: u64,
    /// Updates dropped because a resync was in flight.
    pub dropped_in_flight: u64,
    /// Resync sessions started.
    pub resyncs_started: u64,
    /// Extra pulls issued because a snapshot came back behind.
    pub repulls: u64,
    /// Pull completions accepted.
    pub pulls_completed: u64,
    /// Pulls that gave up.
    pub pulls_failed: u64,
    /// Completions or failures for a ticket that was not outstanding.
    pub ignored_completions: u64,
    /// Secrets persisted.
    pub secrets_stored: u64,
    /// Secret store errors.
    pub secret_write_failures: u64,
}

/// The client's local copy of the engine's state.
#[derive(Debug)]
pub struct ClientMirror {
    state: AppState,
    last_applied: Revision,
    resync: ResyncCoordinator,
    config: MirrorConfig,
    stats: MirrorStats,
}

impl ClientMirror {
    /// Creates a mirror seeded from an initial snapshot.
    pub fn new(initial: AppState) -> Self {
        Self::with_config(initial, MirrorConfig::default())
    }

    /// Creates a mirror with a custom configuration.
    pub fn with_config(initial: AppState, config: MirrorConfig) -> Self {
        Self {
            last_applied: initial.rev,
            state: initial,
            resync: ResyncCoordinator::new(),
            config,
            stats: MirrorStats::default(),
        }
    }

    /// Returns the mirrored state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Returns the revision of the last merged update or snapshot.
    pub fn last_applied(&self) -> Revision {
        self.last_applied
    }

    /// Returns true while a snapshot pull is outstanding.
    pub fn resync_in_flight(&self) -> bool {
        self.resync.is_in_flight()
    }

    /// Returns true if the last resync gave up.
    pub fn resync_stalled(&self) -> bool {
        self.resync.is_stalled()
    }

    /// Returns the coordinator.
    pub fn resync(&self) -> &ResyncCoordinator {
        &self.resync
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Returns the counters.
    pub fn stats(&self) -> &MirrorStats {
        &self.stats
    }

    /// Handles one pushed update.
    ///
    /// Secret payloads are persisted first, regardless of what the gate
    /// decides for the update's revision.
    pub fn on_update<S>(&mut self, update: AppUpdate, store: &S) -> UpdateOutcome
    where
        S: SecretStore + ?Sized,
    {
        self.stats.updates_received += 1;
        match extractor::extract_and_store(&update, store) {
            ExtractOutcome::Stored => self.stats.secrets_stored += 1,
            ExtractOutcome::Failed => self.stats.secret_write_failures += 1,
            _ => {}
        }

        let rev = update.rev();
        if self.resync.is_stalled() {
            return self.start_resync(rev, "stalled resync restarted by traffic");
        }

        match gate::classify(rev, self.last_applied, self.resync.is_in_flight()) {
            GateDecision::Drop(DropReason::Stale) => {
                self.stats.dropped_stale += 1;
                tracing::debug!(
                    %rev,
                    last_applied = %self.last_applied,
                    kind = %update.kind(),
                    "dropped stale update"
                );
                UpdateOutcome::Dropped(DropReason::Stale)
            }
            GateDecision::Drop(DropReason::ResyncInFlight) => {
                self.resync.observe(rev);
                self.stats.dropped_in_flight += 1;
                tracing::debug!(%rev, kind = %update.kind(), "dropped update during resync");
                UpdateOutcome::Dropped(DropReason::ResyncInFlight)
            }
            GateDecision::Apply => {
                let state = std::mem::take(&mut self.state);
                self.state = merger::merge(state, &update);
                self.last_applied = rev;
                self.stats.updates_applied += 1;
                tracing::debug!(%rev, kind = %update.kind(), "applied update");
                UpdateOutcome::Applied
            }
            GateDecision::TriggerResync => self.start_resync(rev, "gap detected"),
        }
    }

    /// Forces a snapshot pull, e.g. when the app returns to the foreground.
    ///
    /// Returns `None` if a pull is already outstanding.
    pub fn request_resync(&mut self) -> Option<ResyncTicket> {
        if self.resync.is_in_flight() {
            return None;
        }
        match self.start_resync(self.last_applied, "resync requested") {
            UpdateOutcome::ResyncStarted(ticket) => Some(ticket),
            _ => None,
        }
    }

    /// Feeds back a successful pull.
    ///
    /// The snapshot replaces the mirror only if it is not older than what the
    /// mirror already holds, so state and `last_applied` never disagree.
    pub fn on_pull_complete(&mut self, ticket: ResyncTicket, snapshot: AppState) -> PullOutcome {
        let pulled = snapshot.rev;
        let completion = self.resync.finish(ticket, pulled);
        if completion == Completion::Ignored {
            self.stats.ignored_completions += 1;
            tracing::debug!(%ticket, %pulled, "ignored completion for unknown pull");
            return PullOutcome::Ignored;
        }

        self.stats.pulls_completed += 1;
        if pulled >= self.last_applied {
            self.state = snapshot;
            self.last_applied = pulled;
        } else {
            tracing::debug!(
                %ticket,
                %pulled,
                last_applied = %self.last_applied,
                "snapshot older than mirror, kept current state"
            );
        }

        match completion {
            Completion::Repull { ticket: next, target } => {
                self.stats.repulls += 1;
                let delay = self.config.repull_delay(next.round);
                tracing::info!(
                    ticket = %next,
                    %pulled,
                    %target,
                    ?delay,
                    "snapshot behind, repulling"
                );
                PullOutcome::Repull {
                    ticket: next,
                    delay,
                }
            }
            _ => {
                tracing::info!(%ticket, rev = %self.last_applied, "resync settled");
                PullOutcome::Settled
            }
        }
    }

    /// Feeds back a pull that gave up.
    pub fn on_pull_failed(&mut self, ticket: ResyncTicket, error: &MirrorError) -> FailureOutcome {
        if self.resync.fail(ticket) {
            self.stats.pulls_failed += 1;
            tracing::warn!(%ticket, %error, "resync stalled");
            FailureOutcome::Stalled
        } else {
            self.stats.ignored_completions += 1;
            tracing::debug!(%ticket, %error, "ignored failure for unknown pull");
            FailureOutcome::Ignored
        }
    }

    fn start_resync(&mut self, rev: Revision, reason: &'static str) -> UpdateOutcome {
        match self.resync.begin(rev) {
            Some(ticket) => {
                self.stats.resyncs_started += 1;
                tracing::info!(
                    %ticket,
                    %rev,
                    last_applied = %self.last_applied,
                    reason,
                    "resync started"
                );
                UpdateOutcome::ResyncStarted(ticket)
            }
            None => {
                self.stats.dropped_in_flight += 1;
                UpdateOutcome::Dropped(DropReason::ResyncInFlight)
            }
        }
    }
}
