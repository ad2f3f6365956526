//! Revision gate.
//!
//! Classifies an incoming update by comparing its revision with the last
//! applied one. The rules are evaluated in order:
//!
//! 1. `update_rev <= last_applied` drops the update (stale or duplicate).
//! 2. A resync in flight drops the update; the caller records the revision
//!    with the coordinator so it is not lost.
//! 3. `update_rev == last_applied + 1` applies the update.
//! 4. Anything further ahead is a gap and triggers a resync.

use shellsync_protocol::Revision;

/// Why an update was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Already applied or superseded.
    Stale,
    /// A resync is in flight; the pulled snapshot will cover it.
    ResyncInFlight,
}

/// Outcome of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Do not apply.
    Drop(DropReason),
    /// Apply through the merger.
    Apply,
    /// A gap exists; pull a full snapshot.
    TriggerResync,
}

/// Classifies an update revision against the mirror's position.
pub fn classify(
    update_rev: Revision,
    last_applied: Revision,
    resync_in_flight: bool,
) -> GateDecision {
    if update_rev <= last_applied {
        GateDecision::Drop(DropReason::Stale)
    } else if resync_in_flight {
        GateDecision::Drop(DropReason::ResyncInFlight)
    } else if update_rev.is_successor_of(last_applied) {
        GateDecision::Apply
    } else {
        GateDecision::TriggerResync
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(n: u64) -> Revision {
        Revision(n)
    }

    #[test]
    fn stale_and_duplicate_are_dropped() {
        assert_eq!(
            classify(r(3), r(5), false),
            GateDecision::Drop(DropReason::Stale)
        );
        assert_eq!(
            classify(r(5), r(5), false),
            GateDecision::Drop(DropReason::Stale)
        );
        // Staleness wins over the in-flight rule.
        assert_eq!(
            classify(r(5), r(5), true),
            GateDecision::Drop(DropReason::Stale)
        );
    }

    #[test]
    fn successor_is_applied() {
        assert_eq!(classify(r(1), r(0), false), GateDecision::Apply);
        assert_eq!(classify(r(6), r(5), false), GateDecision::Apply);
    }

    #[test]
    fn gap_triggers_resync() {
        assert_eq!(classify(r(2), r(0), false), GateDecision::TriggerResync);
        assert_eq!(classify(r(100), r(5), false), GateDecision::TriggerResync);
    }

    #[test]
    fn in_flight_drops_everything_newer() {
        assert_eq!(
            classify(r(6), r(5), true),
            GateDecision::Drop(DropReason::ResyncInFlight)
        );
        assert_eq!(
            classify(r(60), r(5), true),
            GateDecision::Drop(DropReason::ResyncInFlight)
        );
    }

    #[test]
    fn exhaustive_small_grid() {
        for last in 0..6u64 {
            for rev in 0..10u64 {
                for in_flight in [false, true] {
                    let decision = classify(r(rev), r(last), in_flight);
                    let expected = if rev <= last {
                        GateDecision::Drop(DropReason::Stale)
                    } else if in_flight {
                        GateDecision::Drop(DropReason::ResyncInFlight)
                    } else if rev == last + 1 {
                        GateDecision::Apply
                    } else {
                        GateDecision::TriggerResync
                    };
                    assert_eq!(
                        decision,
                        expected,
                        "rev={rev} last={last} in_flight={in_flight}"
                    );
                }
            }
        }
    }
}
