//! Simulate command implementation.
//!
//! Generates an engine history, publishes it from a delivery thread in a
//! seeded disordered schedule, and waits for the threaded mirror to catch up.

use serde::Serialize;
use shellsync_mirror::{
    MemorySecretStore, MirrorConfig, MirrorManager, MirrorStats, RetryConfig, SecretStore,
};
use shellsync_protocol::{
    AppUpdate, BusyState, ChatSummary, FieldValue, MemberInfo, Revision, SecretSlot,
};
use shellsync_testkit::{DeliverySchedule, SimEngine};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

/// Parameters of one simulation run.
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    /// Number of engine updates to generate.
    pub updates: u64,
    /// Seed for the delivery schedule.
    pub seed: u64,
    /// Reorder window of the delivery schedule.
    pub reorder_window: usize,
    /// Duplicate rate of the delivery schedule.
    pub duplicate_rate: f64,
    /// Revision at which an account is created, if any.
    pub secret_at: Option<u64>,
    /// Snapshot pulls that fail before the engine recovers.
    pub failing_pulls: usize,
    /// How long to wait for convergence.
    pub timeout: Duration,
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self {
            updates: 500,
            seed: 0,
            reorder_window: 4,
            duplicate_rate: 0.1,
            secret_at: None,
            failing_pulls: 0,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Simulation result.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    /// Updates generated by the engine.
    pub updates: u64,
    /// Deliveries made, duplicates included.
    pub delivered: usize,
    /// Schedule seed.
    pub seed: u64,
    /// Engine revision at the end.
    pub engine_rev: Revision,
    /// Mirror revision at the end.
    pub mirror_rev: Revision,
    /// Whether the mirror equals the engine state.
    pub converged: bool,
    /// Whether the account key reached the secret store.
    pub secret_stored: bool,
    /// Snapshot pulls served or failed by the engine.
    pub engine_pulls: usize,
    /// Time from first delivery to convergence (or timeout).
    pub elapsed_ms: u64,
    /// Mirror counters.
    pub stats: MirrorStats,
}

/// Runs the simulate command.
pub fn run(options: &SimulateOptions, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = simulate(options)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_output(&report);
        }
    }

    if !report.converged {
        return Err(format!(
            "mirror did not converge: at {} of {}",
            report.mirror_rev, report.engine_rev
        )
        .into());
    }
    Ok(())
}

/// Runs one simulation and returns its report.
pub fn simulate(options: &SimulateOptions) -> Result<SimulationReport, Box<dyn std::error::Error>> {
    if let Some(rev) = options.secret_at {
        if rev == 0 || rev > options.updates {
            return Err(format!("--secret-at must be within 1..={}", options.updates).into());
        }
    }

    let engine = Arc::new(SimEngine::new());
    let store = Arc::new(MemorySecretStore::new());
    let config = MirrorConfig::default().with_retry(
        RetryConfig::unbounded()
            .with_initial_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_secs(1)),
    );
    let manager = MirrorManager::start(engine.clone(), store.clone(), config)?;

    let history: Vec<AppUpdate> = (1..=options.updates)
        .map(|rev| {
            if Some(rev) == options.secret_at {
                engine.create_account("nsec1simulated", "5157", "npub1simulated")
            } else {
                engine.mutate(synthetic_change(rev))
            }
        })
        .collect();
    engine.fail_next_pulls(options.failing_pulls);

    let plan = DeliverySchedule::new(options.seed)
        .with_reorder_window(options.reorder_window)
        .with_duplicate_rate(options.duplicate_rate)
        .plan(&history);
    let delivered = plan.len();
    info!(
        updates = options.updates,
        delivered,
        seed = options.seed,
        "Starting simulation"
    );

    let started = Instant::now();
    let publisher = {
        let engine = engine.clone();
        thread::Builder::new()
            .name("shellsync-publisher".into())
            .spawn(move || {
                for update in plan {
                    engine.publish(update);
                }
            })?
    };
    publisher
        .join()
        .map_err(|_| "delivery thread panicked")?;

    let engine_rev = engine.rev();
    let reached = manager.wait_for_rev(engine_rev, options.timeout);
    let elapsed = started.elapsed();
    // Drain pushes still queued behind the snapshot that reached the head.
    manager.shutdown();
    let converged = reached && manager.state() == engine.current();
    info!(
        converged,
        elapsed_ms = elapsed.as_millis() as u64,
        "Simulation finished"
    );

    let report = SimulationReport {
        updates: options.updates,
        delivered,
        seed: options.seed,
        engine_rev,
        mirror_rev: manager.last_applied(),
        converged,
        secret_stored: store.read(SecretSlot::AccountKey)?.is_some(),
        engine_pulls: engine.pull_count(),
        elapsed_ms: elapsed.as_millis() as u64,
        stats: manager.stats(),
    };
    Ok(report)
}

/// A deterministic field change for revision `rev`.
fn synthetic_change(rev: u64) -> FieldValue {
    match rev % 4 {
        0 => FieldValue::Busy(BusyState {
            creating_chat: rev % 8 == 0,
            ..BusyState::idle()
        }),
        1 => FieldValue::Toast(Some(format!("update {rev}"))),
        2 => FieldValue::ChatList(vec![ChatSummary {
            chat_id: format!("{:08x}", rev / 16),
            is_group: false,
            group_name: None,
            members: vec![MemberInfo {
                pubkey: "5157".into(),
                npub: "npub1peer".into(),
                name: None,
            }],
            last_message: Some(format!("message {rev}")),
            last_message_at: Some(1_700_000_000 + rev as i64),
            unread_count: (rev % 5) as u32,
        }]),
        _ => FieldValue::Toast(None),
    }
}

fn print_text_output(report: &SimulationReport) {
    println!("shellsync Simulation");
    println!("====================");
    println!();
    println!("Schedule:");
    println!("  Updates:     {}", report.updates);
    println!("  Deliveries:  {}", report.delivered);
    println!("  Seed:        {}", report.seed);
    println!();
    println!("Result:");
    if report.converged {
        println!(
            "  ✓ Converged at {} in {} ms",
            report.mirror_rev, report.elapsed_ms
        );
    } else {
        println!(
            "  ✗ Stopped at {} (engine at {}) after {} ms",
            report.mirror_rev, report.engine_rev, report.elapsed_ms
        );
    }
    println!("  Engine pulls:  {}", report.engine_pulls);
    println!(
        "  Secret stored: {}",
        if report.secret_stored { "yes" } else { "no" }
    );
    println!();
    print_stats(&report.stats);
}

/// Prints mirror counters.
pub fn print_stats(stats: &MirrorStats) {
    println!("Mirror:");
    println!("  Updates received:     {}", stats.updates_received);
    println!("  Updates applied:      {}", stats.updates_applied);
    println!("  Dropped (stale):      {}", stats.dropped_stale);
    println!("  Dropped (in flight):  {}", stats.dropped_in_flight);
    println!("  Resyncs started:      {}", stats.resyncs_started);
    println!("  Repulls:              {}", stats.repulls);
    println!(
        "  Pulls:                {} completed, {} failed",
        stats.pulls_completed, stats.pulls_failed
    );
    println!("  Ignored completions:  {}", stats.ignored_completions);
    println!(
        "  Secrets:              {} stored, {} write failures",
        stats.secrets_stored, stats.secret_write_failures
    );
}
