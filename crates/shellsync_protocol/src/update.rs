//! The revisioned update stream pushed by the engine.

use crate::field::FieldValue;
use crate::revision::Revision;
use crate::secret::{Secret, SecretSlot};
use crate::state::AppState;
use std::fmt;

/// An update pushed by the engine. Every variant carries a revision.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum AppUpdate {
    /// Replaces the entire mirror. The revision is `snapshot.rev`.
    FullState(AppState),
    /// Replaces exactly one field.
    FieldChanged {
        /// Revision of this change.
        rev: Revision,
        /// New value; its variant names the field.
        value: FieldValue,
    },
    /// Carries a payload that is never part of any snapshot and must be
    /// persisted out-of-band.
    SideEffect {
        /// Revision of this change.
        rev: Revision,
        /// The one-time payload.
        payload: SecretPayload,
    },
}

impl AppUpdate {
    /// Returns the revision of this update.
    pub fn rev(&self) -> Revision {
        match self {
            AppUpdate::FullState(state) => state.rev,
            AppUpdate::FieldChanged { rev, .. } => *rev,
            AppUpdate::SideEffect { rev, .. } => *rev,
        }
    }

    /// Returns the kind of this update.
    pub fn kind(&self) -> UpdateKind {
        match self {
            AppUpdate::FullState(_) => UpdateKind::FullState,
            AppUpdate::FieldChanged { .. } => UpdateKind::FieldChanged,
            AppUpdate::SideEffect { .. } => UpdateKind::SideEffect,
        }
    }

    /// Returns the secret payload, if this update carries one.
    pub fn secret_payload(&self) -> Option<&SecretPayload> {
        match self {
            AppUpdate::SideEffect { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Creates a field delta.
    pub fn field(rev: impl Into<Revision>, value: FieldValue) -> Self {
        AppUpdate::FieldChanged {
            rev: rev.into(),
            value,
        }
    }

    /// Creates an "account created" side effect carrying a fresh account key.
    pub fn account_created(
        rev: impl Into<Revision>,
        nsec: impl Into<Secret>,
        pubkey: impl Into<String>,
        npub: impl Into<String>,
    ) -> Self {
        AppUpdate::SideEffect {
            rev: rev.into(),
            payload: SecretPayload {
                slot: SecretSlot::AccountKey,
                secret: nsec.into(),
                pubkey: pubkey.into(),
                npub: npub.into(),
            },
        }
    }
}

/// Discriminant of [`AppUpdate`], cheap to copy into logs and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    /// `AppUpdate::FullState`.
    FullState,
    /// `AppUpdate::FieldChanged`.
    FieldChanged,
    /// `AppUpdate::SideEffect`.
    SideEffect,
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UpdateKind::FullState => "full_state",
            UpdateKind::FieldChanged => "field_changed",
            UpdateKind::SideEffect => "side_effect",
        })
    }
}

/// A one-time secret delivered alongside the identity it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct SecretPayload {
    /// Slot the secret belongs in.
    pub slot: SecretSlot,
    /// The secret itself.
    pub secret: Secret,
    /// Hex public key of the account.
    pub pubkey: String,
    /// Bech32 public key of the account.
    pub npub: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rev_per_variant() {
        let mut state = AppState::empty();
        state.rev = Revision(3);
        assert_eq!(AppUpdate::FullState(state).rev(), Revision(3));
        assert_eq!(
            AppUpdate::field(4, FieldValue::Toast(None)).rev(),
            Revision(4)
        );
        assert_eq!(
            AppUpdate::account_created(5, "nsec1", "ab", "npub1").rev(),
            Revision(5)
        );
    }

    #[test]
    fn only_side_effects_carry_secrets() {
        let update = AppUpdate::account_created(1, "nsec1abc", "ab", "npub1");
        let payload = update.secret_payload().unwrap();
        assert_eq!(payload.slot, SecretSlot::AccountKey);
        assert_eq!(payload.secret.expose(), "nsec1abc");
        assert_eq!(update.kind(), UpdateKind::SideEffect);

        assert!(AppUpdate::FullState(AppState::empty())
            .secret_payload()
            .is_none());
    }
}
