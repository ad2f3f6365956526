//! Engine-issued revisions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Revision of the engine state.
///
/// Revisions are issued only by the engine, strictly increase with every
/// state-affecting change, and are ordered globally across all fields.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Revision(pub u64);

impl Revision {
    /// The revision of an engine that has not changed anything yet.
    pub const ZERO: Revision = Revision(0);

    /// Creates a new revision.
    #[must_use]
    pub const fn new(rev: u64) -> Self {
        Self(rev)
    }

    /// Returns the raw revision value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next revision.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns true if `self` immediately follows `prev`.
    #[must_use]
    pub fn is_successor_of(self, prev: Revision) -> bool {
        prev.0.checked_add(1) == Some(self.0)
    }
}

impl From<u64> for Revision {
    fn from(rev: u64) -> Self {
        Self(rev)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rev:{}", self.0)
    }
}
