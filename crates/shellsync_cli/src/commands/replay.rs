//! Replay command implementation.
//!
//! A script describes an engine history and the order in which its updates
//! reach the client. Revisions are assigned by position: the first history
//! entry becomes `rev:1`.
//!
//! ```json
//! {
//!   "history": [
//!     { "field": "toast", "value": "hello" },
//!     { "secret": { "nsec": "nsec1abc", "pubkey": "ab", "npub": "npub1ab" } },
//!     { "field": "toast", "value": null }
//!   ],
//!   "deliver": [1, 3, 2, "pull"]
//! }
//! ```
//!
//! `"pull"` completes the outstanding snapshot pull and `"resync"` forces
//! one. Pulls still outstanding after the last step are completed until the
//! mirror settles.

use crate::commands::simulate::print_stats;
use serde::{Deserialize, Serialize};
use shellsync_mirror::{FailureOutcome, MirrorStats, PullOutcome};
use shellsync_protocol::{AppUpdate, FieldValue, Revision, SecretSlot};
use shellsync_testkit::{PullStep, ReconcileHarness, SimEngine};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Upper bound on pulls completed after the scripted steps.
const SETTLE_BOUND: usize = 64;

/// A replay script.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayScript {
    /// Engine history, one update per entry.
    pub history: Vec<HistoryEntry>,
    /// Delivery order and pull completions.
    pub deliver: Vec<ReplayStep>,
    /// Snapshot pulls the engine fails before recovering.
    #[serde(default)]
    pub failing_pulls: usize,
}

/// One entry of the engine history.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HistoryEntry {
    /// A single-field change.
    Field(FieldValue),
    /// Account creation carrying a secret.
    Secret {
        /// The issued identity.
        secret: AccountSecret,
    },
}

/// Identity issued by an account creation.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSecret {
    /// Private key.
    pub nsec: String,
    /// Hex public key.
    pub pubkey: String,
    /// Bech32 public key.
    pub npub: String,
}

/// One scripted step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ReplayStep {
    /// Deliver the update with this revision.
    Deliver(u64),
    /// Drive the resync side.
    Command(ReplayCommand),
}

/// Commands that drive the resync side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayCommand {
    /// Complete the outstanding pull.
    Pull,
    /// Force a resync.
    Resync,
}

/// One line of replay output.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayLine {
    /// What was done.
    pub action: String,
    /// What the mirror did.
    pub outcome: String,
    /// Mirror position afterwards.
    pub last_applied: Revision,
}

/// Replay result.
#[derive(Debug, Serialize)]
pub struct ReplayReport {
    /// Every step, scripted and settling.
    pub steps: Vec<ReplayLine>,
    /// Engine revision.
    pub engine_rev: Revision,
    /// Mirror revision.
    pub mirror_rev: Revision,
    /// No pull outstanding at the end.
    pub settled: bool,
    /// Mirror equals the engine.
    pub converged: bool,
    /// The account key is in the secret store.
    pub secret_stored: bool,
    /// Mirror counters.
    pub stats: MirrorStats,
}

/// Runs the replay command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    info!("Replaying {:?}", path);
    let script = load(path)?;
    let report = replay(&script)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_output(&report);
        }
    }
    Ok(())
}

/// Reads and parses a script file.
pub fn load(path: &Path) -> Result<ReplayScript, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Replays a script against a fresh engine and mirror.
pub fn replay(script: &ReplayScript) -> Result<ReplayReport, Box<dyn std::error::Error>> {
    let engine = Arc::new(SimEngine::new());
    let mut harness = ReconcileHarness::new(engine.clone())?;

    let updates: Vec<AppUpdate> = script
        .history
        .iter()
        .map(|entry| match entry {
            HistoryEntry::Field(value) => engine.mutate(value.clone()),
            HistoryEntry::Secret { secret } => {
                engine.create_account(&secret.nsec, &secret.pubkey, &secret.npub)
            }
        })
        .collect();
    engine.fail_next_pulls(script.failing_pulls);

    let mut steps = Vec::with_capacity(script.deliver.len());
    for step in &script.deliver {
        let (action, outcome) = match step {
            ReplayStep::Deliver(rev) => {
                let update = usize::try_from(*rev)
                    .ok()
                    .and_then(|rev| rev.checked_sub(1))
                    .and_then(|index| updates.get(index))
                    .ok_or_else(|| format!("no update at rev:{rev}"))?
                    .clone();
                let kind = update.kind();
                let outcome = harness.deliver(update);
                (format!("deliver rev:{rev} {kind}"), outcome.to_string())
            }
            ReplayStep::Command(ReplayCommand::Pull) => {
                let outcome = match harness.complete_pull() {
                    Some(pull) => describe_pull(&pull),
                    None => "no_pull_outstanding".to_string(),
                };
                ("pull".to_string(), outcome)
            }
            ReplayStep::Command(ReplayCommand::Resync) => {
                let outcome = match harness.request_resync() {
                    Some(ticket) => format!("resync_started({ticket})"),
                    None => "resync_in_flight".to_string(),
                };
                ("resync".to_string(), outcome)
            }
        };
        steps.push(ReplayLine {
            action,
            outcome,
            last_applied: harness.mirror().last_applied(),
        });
    }

    for _ in 0..SETTLE_BOUND {
        let Some(pull) = harness.complete_pull() else {
            break;
        };
        steps.push(ReplayLine {
            action: "settle".to_string(),
            outcome: describe_pull(&pull),
            last_applied: harness.mirror().last_applied(),
        });
    }

    Ok(ReplayReport {
        steps,
        engine_rev: engine.rev(),
        mirror_rev: harness.mirror().last_applied(),
        settled: harness.pending_pull().is_none(),
        converged: harness.converged(),
        secret_stored: harness.store().read(SecretSlot::AccountKey)?.is_some(),
        stats: harness.mirror().stats().clone(),
    })
}

fn describe_pull(step: &PullStep) -> String {
    match step {
        PullStep::Completed(PullOutcome::Settled) => "settled".to_string(),
        PullStep::Completed(PullOutcome::Repull { ticket, .. }) => format!("repull({ticket})"),
        PullStep::Completed(PullOutcome::Ignored) => "ignored".to_string(),
        PullStep::Failed(FailureOutcome::Stalled) => "failed_stalled".to_string(),
        PullStep::Failed(FailureOutcome::Ignored) => "failed_ignored".to_string(),
    }
}

fn print_text_output(report: &ReplayReport) {
    println!("shellsync Replay");
    println!("================");
    println!();
    for (i, line) in report.steps.iter().enumerate() {
        println!(
            "  {:>3}. {:<32} {:<28} last_applied={}",
            i + 1,
            line.action,
            line.outcome,
            line.last_applied
        );
    }
    println!();
    println!("Result:");
    if report.converged {
        println!("  ✓ Converged at {}", report.mirror_rev);
    } else if report.settled {
        println!(
            "  ✗ Settled at {} but engine is at {}",
            report.mirror_rev, report.engine_rev
        );
    } else {
        println!(
            "  ✗ Pull still outstanding at {} (engine at {})",
            report.mirror_rev, report.engine_rev
        );
    }
    println!(
        "  Secret stored: {}",
        if report.secret_stored { "yes" } else { "no" }
    );
    println!();
    print_stats(&report.stats);
}
