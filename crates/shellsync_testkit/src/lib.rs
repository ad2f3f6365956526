//! # shellsync testkit
//!
//! Test utilities for shellsync.
//!
//! This crate provides:
//! - `SimEngine`, an authoritative engine with full revision history
//! - Seeded delivery schedules (reorder windows, duplicates)
//! - `ReconcileHarness`, a deterministic single-threaded driver
//! - Property-based generators using proptest
//! - Fixtures: sample states and temporary secret stores
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shellsync_testkit::prelude::*;
//!
//! #[test]
//! fn converges() {
//!     let engine = Arc::new(SimEngine::new());
//!     let mut harness = ReconcileHarness::new(engine.clone()).unwrap();
//!     let update = engine.mutate(FieldValue::Toast(None));
//!     harness.deliver(update);
//!     assert!(harness.converged());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod harness;
pub mod schedule;
pub mod sim_engine;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::harness::*;
    pub use crate::schedule::*;
    pub use crate::sim_engine::*;
}

pub use fixtures::*;
pub use generators::*;
pub use harness::*;
pub use schedule::*;
pub use sim_engine::*;
