//! # shellsync mirror
//!
//! Keeps a client-side copy of the engine's state consistent with the
//! authoritative state, given an unreliable push channel.
//!
//! This crate provides:
//! - The revision gate and update merger
//! - Side-effect extraction into a write-once secret store
//! - The resync coordinator (single in-flight snapshot pull, repull on lag)
//! - `ClientMirror`, a sans-IO composition of the above
//! - `MirrorManager`, a threaded runtime driving a `ClientMirror` against an
//!   `Engine`
//!
//! ## Architecture
//!
//! The engine assigns every state change a revision. The mirror applies
//! exactly the successor of its last applied revision and drops anything at
//! or below it. Any gap triggers a full snapshot pull; while that pull runs,
//! pushed updates are dropped and only their highest revision is
//! remembered, so a snapshot that comes back behind is pulled again.
//!
//! ## Key Invariants
//!
//! - The last applied revision never decreases
//! - At most one snapshot pull is in flight
//! - A delta is applied only on top of its immediate predecessor
//! - Secret payloads are stored at most once, regardless of delivery order

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
pub mod extractor;
pub mod gate;
mod manager;
pub mod merger;
mod mirror;
mod pull;
mod resync;
mod secret_store;
mod session;

pub use config::{MirrorConfig, RetryConfig};
pub use engine::{Engine, MockEngine, UpdateHandler};
pub use error::{MirrorError, MirrorResult};
pub use extractor::{extract_and_store, ExtractOutcome};
pub use gate::{classify, DropReason, GateDecision};
pub use manager::MirrorManager;
pub use merger::merge;
pub use mirror::{ClientMirror, FailureOutcome, MirrorStats, PullOutcome, UpdateOutcome};
pub use pull::{pull_with_retry, sleep_unless_cancelled};
pub use resync::{Completion, ResyncCoordinator, ResyncPhase, ResyncTicket};
pub use secret_store::{FileSecretStore, MemorySecretStore, SecretStore, WriteOutcome};
pub use session::SessionTracker;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
