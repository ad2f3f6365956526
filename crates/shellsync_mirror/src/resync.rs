//! Resync coordinator.
//!
//! Owns the "catch up via full snapshot" procedure:
//!
//! ```text
//!           begin(rev)                     finish(R), max_seen <= R
//!   Idle ─────────────▶ InFlight ─────────────────────────────────▶ Idle
//!    ▲                   │    ▲
//!    │      fail()       │    │ finish(R), max_seen > R  (repull, round + 1)
//!    │   ┌───────────────┘    └──────────┐
//!    │   ▼                               │
//!   Stalled ── begin(rev) ──▶ InFlight ──┘
//! ```
//!
//! At most one pull is in flight. Revisions seen while it runs only raise
//! `max_seen`; if the snapshot comes back older than `max_seen`, the same
//! session repulls. Every pull carries a [`ResyncTicket`] and completions for
//! any other ticket are ignored.

use shellsync_protocol::Revision;
use std::fmt;

/// Identifies one snapshot pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResyncTicket {
    /// Resync session, unique per mirror.
    pub session: u64,
    /// 0 for the first pull of a session, then 1, 2, ... for repulls.
    pub round: u32,
}

impl fmt::Display for ResyncTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resync:{}.{}", self.session, self.round)
    }
}

/// Current phase of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncPhase {
    /// No resync needed.
    Idle,
    /// A pull is outstanding.
    InFlight {
        /// Ticket of the outstanding pull.
        ticket: ResyncTicket,
        /// Highest revision observed since the session began.
        max_seen: Revision,
    },
    /// Pulls kept failing; the next trigger restarts the session.
    Stalled {
        /// Highest revision observed before giving up.
        max_seen: Revision,
    },
}

/// Result of [`ResyncCoordinator::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The snapshot covers everything observed; back to idle.
    Settled,
    /// The snapshot is older than a revision observed mid-pull.
    Repull {
        /// Ticket for the next pull.
        ticket: ResyncTicket,
        /// Revision the next snapshot must reach.
        target: Revision,
    },
    /// The ticket is not the outstanding one.
    Ignored,
}

/// Resync state machine.
#[derive(Debug)]
pub struct ResyncCoordinator {
    phase: ResyncPhase,
    next_session: u64,
}

impl ResyncCoordinator {
    /// Creates an idle coordinator.
    pub fn new() -> Self {
        Self {
            phase: ResyncPhase::Idle,
            next_session: 1,
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> ResyncPhase {
        self.phase
    }

    /// Returns true while a pull is outstanding.
    pub fn is_in_flight(&self) -> bool {
        matches!(self.phase, ResyncPhase::InFlight { .. })
    }

    /// Returns true if the last session gave up after failed pulls.
    pub fn is_stalled(&self) -> bool {
        matches!(self.phase, ResyncPhase::Stalled { .. })
    }

    /// Returns the ticket of the outstanding pull.
    pub fn current_ticket(&self) -> Option<ResyncTicket> {
        match self.phase {
            ResyncPhase::InFlight { ticket, .. } => Some(ticket),
            _ => None,
        }
    }

    /// Returns the highest revision observed by the current or stalled session.
    pub fn max_seen(&self) -> Option<Revision> {
        match self.phase {
            ResyncPhase::InFlight { max_seen, .. } | ResyncPhase::Stalled { max_seen } => {
                Some(max_seen)
            }
            ResyncPhase::Idle => None,
        }
    }

    /// Starts a resync because `trigger_rev` revealed a gap.
    ///
    /// Returns the ticket of the pull to issue, or `None` if a pull is
    /// already in flight; in that case the revision is recorded against it.
    pub fn begin(&mut self, trigger_rev: Revision) -> Option<ResyncTicket> {
        let carried = match self.phase {
            ResyncPhase::InFlight { .. } => {
                self.observe(trigger_rev);
                return None;
            }
            ResyncPhase::Stalled { max_seen } => max_seen,
            ResyncPhase::Idle => Revision::ZERO,
        };

        let ticket = ResyncTicket {
            session: self.next_session,
            round: 0,
        };
        self.next_session += 1;
        self.phase = ResyncPhase::InFlight {
            ticket,
            max_seen: carried.max(trigger_rev),
        };
        Some(ticket)
    }

    /// Records a revision that arrived while a pull is in flight.
    ///
    /// Returns true if it raised `max_seen`.
    pub fn observe(&mut self, rev: Revision) -> bool {
        match &mut self.phase {
            ResyncPhase::InFlight { max_seen, .. } if rev > *max_seen => {
                *max_seen = rev;
                true
            }
            _ => false,
        }
    }

    /// Completes the pull identified by `ticket` with a snapshot at `pulled_rev`.
    pub fn finish(&mut self, ticket: ResyncTicket, pulled_rev: Revision) -> Completion {
        let ResyncPhase::InFlight {
            ticket: current,
            max_seen,
        } = self.phase
        else {
            return Completion::Ignored;
        };
        if current != ticket {
            return Completion::Ignored;
        }

        if max_seen > pulled_rev {
            let next = ResyncTicket {
                session: ticket.session,
                round: ticket.round.saturating_add(1),
            };
            self.phase = ResyncPhase::InFlight {
                ticket: next,
                max_seen,
            };
            Completion::Repull {
                ticket: next,
                target: max_seen,
            }
        } else {
            self.phase = ResyncPhase::Idle;
            Completion::Settled
        }
    }

    /// Gives up on the pull identified by `ticket`.
    ///
    /// Returns false if the ticket is not the outstanding one.
    pub fn fail(&mut self, ticket: ResyncTicket) -> bool {
        match self.phase {
            ResyncPhase::InFlight {
                ticket: current,
                max_seen,
            } if current == ticket => {
                self.phase = ResyncPhase::Stalled { max_seen };
                true
            }
            _ => false,
        }
    }
}

impl Default for ResyncCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
