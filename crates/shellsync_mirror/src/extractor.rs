//! Side-effect extractor.
//!
//! Runs on every inbound update before the revision gate has any say.
//! Side-effect payloads are never part of a snapshot, so gating them on
//! revision freshness would lose them for good. The policy is first write
//! wins: a populated slot is never overwritten, which makes replays,
//! duplicates and out-of-order deliveries harmless.

use crate::secret_store::{SecretStore, WriteOutcome};
use shellsync_protocol::AppUpdate;

/// Result of [`extract_and_store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// The update carries no secret.
    NoPayload,
    /// The slot was empty and now holds the secret.
    Stored,
    /// The slot was already populated.
    AlreadyPopulated,
    /// The payload's secret was blank.
    EmptySecret,
    /// The store failed; reconciliation continues regardless.
    Failed,
}

/// Persists the update's secret payload, if any, into an empty slot.
pub fn extract_and_store<S>(update: &AppUpdate, store: &S) -> ExtractOutcome
where
    S: SecretStore + ?Sized,
{
    let Some(payload) = update.secret_payload() else {
        return ExtractOutcome::NoPayload;
    };
    if payload.secret.is_blank() {
        return ExtractOutcome::EmptySecret;
    }

    match store.is_empty(payload.slot) {
        Ok(false) => return ExtractOutcome::AlreadyPopulated,
        Ok(true) => {}
        Err(e) => {
            tracing::warn!(
                slot = %payload.slot,
                rev = %update.rev(),
                error = %e,
                "secret store check failed"
            );
            return ExtractOutcome::Failed;
        }
    }

    match store.write_once(payload.slot, &payload.secret) {
        Ok(WriteOutcome::Written) => {
            tracing::info!(
                slot = %payload.slot,
                rev = %update.rev(),
                npub = %payload.npub,
                "stored secret"
            );
            ExtractOutcome::Stored
        }
        Ok(WriteOutcome::AlreadyPopulated) => ExtractOutcome::AlreadyPopulated,
        Ok(WriteOutcome::Blank) => ExtractOutcome::EmptySecret,
        Err(e) => {
            tracing::warn!(
                slot = %payload.slot,
                rev = %update.rev(),
                error = %e,
                "secret store write failed"
            );
            ExtractOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MirrorError, MirrorResult};
    use crate::secret_store::MemorySecretStore;
    use shellsync_protocol::{AppState, FieldValue, Secret, SecretSlot};

    struct BrokenStore;

    impl SecretStore for BrokenStore {
        fn write_once(&self, _: SecretSlot, _: &Secret) -> MirrorResult<WriteOutcome> {
            Err(MirrorError::SecretStore("keychain locked".into()))
        }

        fn read(&self, _: SecretSlot) -> MirrorResult<Option<Secret>> {
            Ok(None)
        }

        fn clear(&self, _: SecretSlot) -> MirrorResult<()> {
            Ok(())
        }
    }

    #[test]
    fn ignores_updates_without_payload() {
        let store = MemorySecretStore::new();
        assert_eq!(
            extract_and_store(&AppUpdate::FullState(AppState::empty()), &store),
            ExtractOutcome::NoPayload
        );
        assert_eq!(
            extract_and_store(&AppUpdate::field(1, FieldValue::Toast(None)), &store),
            ExtractOutcome::NoPayload
        );
        assert!(store.is_empty(SecretSlot::AccountKey).unwrap());
    }

    #[test]
    fn first_write_wins() {
        let store = MemorySecretStore::new();
        let first = AppUpdate::account_created(3, "nsec1first", "aa", "npub1a");
        let second = AppUpdate::account_created(2, "nsec1second", "bb", "npub1b");

        assert_eq!(extract_and_store(&first, &store), ExtractOutcome::Stored);
        assert_eq!(
            extract_and_store(&second, &store),
            ExtractOutcome::AlreadyPopulated
        );
        assert_eq!(
            extract_and_store(&first, &store),
            ExtractOutcome::AlreadyPopulated
        );
        assert_eq!(
            store
                .read(SecretSlot::AccountKey)
                .unwrap()
                .unwrap()
                .expose(),
            "nsec1first"
        );
    }

    #[test]
    fn blank_secret_is_not_stored() {
        let store = MemorySecretStore::new();
        let update = AppUpdate::account_created(1, " ", "aa", "npub1a");
        assert_eq!(
            extract_and_store(&update, &store),
            ExtractOutcome::EmptySecret
        );
        assert!(store.is_empty(SecretSlot::AccountKey).unwrap());
    }

    #[test]
    fn store_failure_is_reported_not_raised() {
        let update = AppUpdate::account_created(1, "nsec1x", "aa", "npub1a");
        assert_eq!(
            extract_and_store(&update, &BrokenStore),
            ExtractOutcome::Failed
        );
    }
}
