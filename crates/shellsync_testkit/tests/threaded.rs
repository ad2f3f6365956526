//! Threaded convergence: a delivery thread publishes a disordered schedule
//! while the manager's actor reconciles.

use shellsync_mirror::{MirrorConfig, MirrorManager, RetryConfig, SecretStore};
use shellsync_protocol::{AppUpdate, FieldValue, SecretSlot};
use shellsync_testkit::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

fn fast_retry() -> MirrorConfig {
    MirrorConfig::default().with_retry(
        RetryConfig::unbounded()
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(10))
            .with_jitter(false),
    )
}

fn history(engine: &SimEngine, len: usize, secret_at: Option<usize>) -> Vec<AppUpdate> {
    (0..len)
        .map(|i| {
            if Some(i) == secret_at {
                engine.create_account("nsec1threaded", "aa", "npub1aa")
            } else {
                engine.mutate(FieldValue::Toast(Some(format!("toast {i}"))))
            }
        })
        .collect()
}

fn run(schedule: DeliverySchedule, failing_pulls: usize) {
    let engine = Arc::new(SimEngine::new());
    let temp = TempSecretStore::new();
    let store = Arc::new(temp.store.clone());
    let manager = MirrorManager::start(engine.clone(), store.clone(), fast_retry()).unwrap();

    let updates = history(&engine, 200, Some(57));
    engine.fail_next_pulls(failing_pulls);

    let plan = schedule.plan(&updates);
    let delivered = plan.len();
    let publisher = {
        let engine = engine.clone();
        thread::spawn(move || {
            for update in plan {
                engine.publish(update);
            }
        })
    };
    publisher.join().unwrap();

    assert!(manager.wait_for_rev(engine.rev(), WAIT));
    // A snapshot can reach the head while pushes are still queued. Shutdown
    // is queued behind them, so every delivery is handled before it returns.
    manager.shutdown();

    assert_eq!(manager.state(), engine.current());
    assert_eq!(manager.stats().updates_received, delivered as u64);
    assert_eq!(
        store.read(SecretSlot::AccountKey).unwrap().unwrap().expose(),
        "nsec1threaded"
    );
    assert_eq!(manager.stats().secrets_stored, 1);
}

#[test]
fn converges_with_in_order_delivery() {
    run(DeliverySchedule::in_order(), 0);
}

#[test]
fn converges_with_reordering_and_duplicates() {
    for seed in 0..5 {
        run(
            DeliverySchedule::new(seed)
                .with_reorder_window(8)
                .with_duplicate_rate(0.2),
            0,
        );
    }
}

#[test]
fn converges_despite_failing_pulls() {
    run(DeliverySchedule::new(7).with_reorder_window(5), 4);
}
