//! End-to-end reconciliation scenarios against the sans-IO mirror.

use shellsync_mirror::{
    ClientMirror, DropReason, MemorySecretStore, PullOutcome, SecretStore, UpdateOutcome,
};
use shellsync_protocol::{
    AppState, AppUpdate, AuthState, FieldValue, Revision, Screen, SecretSlot,
};
use std::time::Duration;

/// Authoritative state as the engine would hold it after each revision.
struct Truth {
    history: Vec<AppState>,
}

impl Truth {
    fn new() -> Self {
        Self {
            history: vec![AppState::empty()],
        }
    }

    fn change(&mut self, value: FieldValue) -> AppUpdate {
        let mut next = self.history.last().unwrap().clone();
        next.rev = next.rev.next();
        next.set_field(value.clone());
        let rev = next.rev;
        self.history.push(next);
        AppUpdate::field(rev, value)
    }

    fn at(&self, rev: u64) -> AppState {
        self.history[rev as usize].clone()
    }
}

fn toast(text: &str) -> FieldValue {
    FieldValue::Toast(Some(text.into()))
}

fn started(outcome: UpdateOutcome) -> shellsync_mirror::ResyncTicket {
    match outcome {
        UpdateOutcome::ResyncStarted(ticket) => ticket,
        other => panic!("expected resync, got {other:?}"),
    }
}

#[test]
fn in_order_deltas_apply_without_resync() {
    let store = MemorySecretStore::new();
    let mut truth = Truth::new();
    let mut mirror = ClientMirror::new(AppState::empty());

    for text in ["one", "two", "three"] {
        let update = truth.change(toast(text));
        assert_eq!(mirror.on_update(update, &store), UpdateOutcome::Applied);
    }

    assert_eq!(mirror.last_applied(), Revision(3));
    assert_eq!(mirror.state(), &truth.at(3));
    assert_eq!(mirror.stats().resyncs_started, 0);
    assert!(!mirror.resync_in_flight());
}

#[test]
fn gap_resyncs_to_pulled_snapshot() {
    let store = MemorySecretStore::new();
    let mut truth = Truth::new();
    let mut mirror = ClientMirror::new(AppState::empty());

    let _lost = truth.change(toast("one"));
    let second = truth.change(FieldValue::Router(shellsync_protocol::Router {
        default_screen: Screen::ChatList,
        screen_stack: vec![],
    }));

    let ticket = started(mirror.on_update(second, &store));
    assert!(mirror.resync_in_flight());

    assert_eq!(
        mirror.on_pull_complete(ticket, truth.at(2)),
        PullOutcome::Settled
    );
    assert_eq!(mirror.last_applied(), Revision(2));
    assert_eq!(mirror.state(), &truth.at(2));
    assert!(!mirror.resync_in_flight());
}

#[test]
fn stale_and_duplicate_redeliveries_are_dropped() {
    let store = MemorySecretStore::new();
    let mut truth = Truth::new();
    let updates: Vec<_> = (1..=5).map(|i| truth.change(toast(&format!("t{i}")))).collect();
    let mut mirror = ClientMirror::new(truth.at(5));

    assert_eq!(
        mirror.on_update(updates[2].clone(), &store),
        UpdateOutcome::Dropped(DropReason::Stale)
    );
    assert_eq!(
        mirror.on_update(updates[4].clone(), &store),
        UpdateOutcome::Dropped(DropReason::Stale)
    );
    assert_eq!(mirror.last_applied(), Revision(5));
    assert_eq!(mirror.state(), &truth.at(5));
    assert_eq!(mirror.stats().dropped_stale, 2);
}

#[test]
fn side_effect_is_stored_even_when_gated_out() {
    let store = MemorySecretStore::new();
    let mut mirror = ClientMirror::new(AppState::empty());
    let created = AppUpdate::account_created(1, "abc", "aa", "npub1a");

    assert_eq!(
        mirror.on_update(created.clone(), &store),
        UpdateOutcome::Applied
    );
    assert_eq!(
        store.read(SecretSlot::AccountKey).unwrap().unwrap().expose(),
        "abc"
    );

    let mut later = AppState::empty();
    later.rev = Revision(10);
    let mut mirror = ClientMirror::new(later);
    assert_eq!(
        mirror.on_update(created, &store),
        UpdateOutcome::Dropped(DropReason::Stale)
    );
    assert_eq!(
        store.read(SecretSlot::AccountKey).unwrap().unwrap().expose(),
        "abc"
    );
    assert_eq!(mirror.stats().secrets_stored, 0);
}

#[test]
fn side_effect_arriving_during_resync_is_still_stored() {
    let store = MemorySecretStore::new();
    let mut mirror = ClientMirror::new(AppState::empty());
    let ticket = started(mirror.on_update(AppUpdate::field(3, toast("gap")), &store));

    let outcome = mirror.on_update(
        AppUpdate::account_created(4, "nsec1mid", "aa", "npub1a"),
        &store,
    );
    assert_eq!(outcome, UpdateOutcome::Dropped(DropReason::ResyncInFlight));
    assert!(!store.is_empty(SecretSlot::AccountKey).unwrap());

    let mut snapshot = AppState::empty();
    snapshot.rev = Revision(4);
    assert_eq!(
        mirror.on_pull_complete(ticket, snapshot),
        PullOutcome::Settled
    );
}

#[test]
fn stale_pull_repulls_until_it_covers_max_seen() {
    let store = MemorySecretStore::new();
    let mut truth = Truth::new();
    let updates: Vec<_> = (1..=4).map(|i| truth.change(toast(&format!("t{i}")))).collect();
    let mut mirror = ClientMirror::new(truth.at(1));

    assert_eq!(
        mirror.on_update(updates[1].clone(), &store),
        UpdateOutcome::Applied
    );
    let ticket = started(mirror.on_update(updates[3].clone(), &store));
    assert_eq!(mirror.resync().max_seen(), Some(Revision(4)));

    let PullOutcome::Repull { ticket: next, delay } = mirror.on_pull_complete(ticket, truth.at(3))
    else {
        panic!("a snapshot behind max_seen must repull");
    };
    assert_eq!(delay, Duration::ZERO);
    assert_eq!(mirror.last_applied(), Revision(3));
    assert!(mirror.resync_in_flight());

    assert_eq!(
        mirror.on_pull_complete(next, truth.at(4)),
        PullOutcome::Settled
    );
    assert_eq!(mirror.last_applied(), Revision(4));
    assert_eq!(mirror.state(), &truth.at(4));
    assert_eq!(mirror.stats().resyncs_started, 1);
    assert_eq!(mirror.stats().repulls, 1);
}

#[test]
fn gaps_during_pull_coalesce_into_one_repull() {
    let store = MemorySecretStore::new();
    let mut truth = Truth::new();
    let updates: Vec<_> = (1..=8).map(|i| truth.change(toast(&format!("t{i}")))).collect();
    let mut mirror = ClientMirror::new(AppState::empty());

    let ticket = started(mirror.on_update(updates[2].clone(), &store));
    // Two more gaps arrive while the first pull is outstanding.
    for idx in [5, 7] {
        assert_eq!(
            mirror.on_update(updates[idx].clone(), &store),
            UpdateOutcome::Dropped(DropReason::ResyncInFlight)
        );
    }

    let PullOutcome::Repull { ticket: next, .. } = mirror.on_pull_complete(ticket, truth.at(3))
    else {
        panic!("expected a single repull");
    };
    assert_eq!(
        mirror.on_pull_complete(next, truth.at(8)),
        PullOutcome::Settled
    );

    assert_eq!(mirror.stats().pulls_completed, 2);
    assert_eq!(mirror.stats().repulls, 1);
    assert_eq!(mirror.state(), &truth.at(8));
}

#[test]
fn pull_that_covers_traffic_needs_no_repull() {
    let store = MemorySecretStore::new();
    let mut truth = Truth::new();
    let updates: Vec<_> = (1..=6).map(|i| truth.change(toast(&format!("t{i}")))).collect();
    let mut mirror = ClientMirror::new(AppState::empty());

    let ticket = started(mirror.on_update(updates[2].clone(), &store));
    mirror.on_update(updates[5].clone(), &store);
    assert_eq!(
        mirror.on_pull_complete(ticket, truth.at(6)),
        PullOutcome::Settled
    );
    assert_eq!(mirror.stats().repulls, 0);
}

#[test]
fn pushed_snapshot_follows_the_gate() {
    let store = MemorySecretStore::new();
    let mut mirror = ClientMirror::new(AppState::empty());

    let mut successor = AppState::empty();
    successor.rev = Revision(1);
    successor.auth = AuthState::LoggedIn {
        npub: "npub1me".into(),
        pubkey: "aa".into(),
    };
    assert_eq!(
        mirror.on_update(AppUpdate::FullState(successor.clone()), &store),
        UpdateOutcome::Applied
    );
    assert_eq!(mirror.state(), &successor);

    let mut ahead = successor;
    ahead.rev = Revision(9);
    assert!(matches!(
        mirror.on_update(AppUpdate::FullState(ahead), &store),
        UpdateOutcome::ResyncStarted(_)
    ));
}

#[test]
fn deltas_resume_after_resync() {
    let store = MemorySecretStore::new();
    let mut truth = Truth::new();
    let updates: Vec<_> = (1..=5).map(|i| truth.change(toast(&format!("t{i}")))).collect();
    let mut mirror = ClientMirror::new(AppState::empty());

    let ticket = started(mirror.on_update(updates[2].clone(), &store));
    mirror.on_pull_complete(ticket, truth.at(3));

    assert_eq!(
        mirror.on_update(updates[3].clone(), &store),
        UpdateOutcome::Applied
    );
    assert_eq!(
        mirror.on_update(updates[4].clone(), &store),
        UpdateOutcome::Applied
    );
    assert_eq!(mirror.state(), &truth.at(5));
}
