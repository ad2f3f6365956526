//! Secret store collaborators.
//!
//! The only contract the reconciliation core relies on is an atomic
//! check-and-set-if-empty per slot: once a slot is populated, further writes
//! are no-ops until the slot is explicitly cleared (logout).

use crate::error::{MirrorError, MirrorResult};
use parking_lot::Mutex;
use shellsync_protocol::{Secret, SecretSlot};
use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Result of [`SecretStore::write_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The slot was empty and now holds the value.
    Written,
    /// The slot already held a value; nothing changed.
    AlreadyPopulated,
    /// The value was blank and was not written.
    Blank,
}

/// Out-of-band storage for secrets that never appear in state snapshots.
pub trait SecretStore: Send + Sync {
    /// Returns true if the slot holds no value.
    fn is_empty(&self, slot: SecretSlot) -> MirrorResult<bool> {
        Ok(self.read(slot)?.is_none())
    }

    /// Stores `secret` if and only if the slot is empty.
    fn write_once(&self, slot: SecretSlot, secret: &Secret) -> MirrorResult<WriteOutcome>;

    /// Reads the slot.
    fn read(&self, slot: SecretSlot) -> MirrorResult<Option<Secret>>;

    /// Empties the slot.
    fn clear(&self, slot: SecretSlot) -> MirrorResult<()>;
}

/// An in-memory secret store.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    slots: Mutex<HashMap<SecretSlot, Secret>>,
}

impl MemorySecretStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with one slot already populated.
    pub fn with_secret(slot: SecretSlot, secret: impl Into<Secret>) -> Self {
        let store = Self::new();
        store.slots.lock().insert(slot, secret.into());
        store
    }
}

impl SecretStore for MemorySecretStore {
    fn write_once(&self, slot: SecretSlot, secret: &Secret) -> MirrorResult<WriteOutcome> {
        if secret.is_blank() {
            return Ok(WriteOutcome::Blank);
        }
        let mut slots = self.slots.lock();
        if slots.contains_key(&slot) {
            return Ok(WriteOutcome::AlreadyPopulated);
        }
        slots.insert(slot, secret.trimmed());
        Ok(WriteOutcome::Written)
    }

    fn read(&self, slot: SecretSlot) -> MirrorResult<Option<Secret>> {
        Ok(self.slots.lock().get(&slot).cloned())
    }

    fn clear(&self, slot: SecretSlot) -> MirrorResult<()> {
        self.slots.lock().remove(&slot);
        Ok(())
    }
}

/// A file-backed secret store: one file per slot inside a directory.
///
/// Values are written to a temporary file and published with a no-clobber
/// rename, so concurrent writers race atomically and readers never see a
/// partially written key. On unix the files are owner-only (`0o600`).
///
/// Clones share one write lock, so replacing a blank leftover file is a
/// single step for every writer in the process.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileSecretStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Returns the directory holding the slot files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file backing a slot.
    pub fn slot_path(&self, slot: SecretSlot) -> PathBuf {
        self.dir.join(format!("{}.secret", slot.name()))
    }

    fn remove_if_exists(path: &Path) -> MirrorResult<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl SecretStore for FileSecretStore {
    fn write_once(&self, slot: SecretSlot, secret: &Secret) -> MirrorResult<WriteOutcome> {
        if secret.is_blank() {
            return Ok(WriteOutcome::Blank);
        }
        let _guard = self.write_lock.lock();
        std::fs::create_dir_all(&self.dir)?;

        let path = self.slot_path(slot);
        if path.exists() {
            if self.read(slot)?.is_some() {
                return Ok(WriteOutcome::AlreadyPopulated);
            }
            // A whitespace-only leftover counts as empty.
            Self::remove_if_exists(&path)?;
        }

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(secret.trimmed().expose().as_bytes())?;
        tmp.as_file().sync_data()?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => Ok(WriteOutcome::Written),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                Ok(WriteOutcome::AlreadyPopulated)
            }
            Err(e) => Err(MirrorError::Io(e.error)),
        }
    }

    fn read(&self, slot: SecretSlot) -> MirrorResult<Option<Secret>> {
        let bytes = match std::fs::read(self.slot_path(slot)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let raw = String::from_utf8(bytes)
            .map_err(|_| MirrorError::SecretStore(format!("{slot} is not valid UTF-8")))?;
        let secret = Secret::new(raw);
        if secret.is_blank() {
            Ok(None)
        } else {
            Ok(Some(secret.trimmed()))
        }
    }

    fn clear(&self, slot: SecretSlot) -> MirrorResult<()> {
        let _guard = self.write_lock.lock();
        Self::remove_if_exists(&self.slot_path(slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SLOT: SecretSlot = SecretSlot::AccountKey;

    fn exercise_write_once(store: &dyn SecretStore) {
        assert!(store.is_empty(SLOT).unwrap());

        assert_eq!(
            store.write_once(SLOT, &Secret::new("  ")).unwrap(),
            WriteOutcome::Blank
        );
        assert!(store.is_empty(SLOT).unwrap());

        assert_eq!(
            store.write_once(SLOT, &Secret::new("nsec1first\n")).unwrap(),
            WriteOutcome::Written
        );
        assert_eq!(
            store.write_once(SLOT, &Secret::new("nsec1second")).unwrap(),
            WriteOutcome::AlreadyPopulated
        );
        assert_eq!(store.read(SLOT).unwrap().unwrap().expose(), "nsec1first");

        store.clear(SLOT).unwrap();
        assert!(store.is_empty(SLOT).unwrap());
        assert_eq!(
            store.write_once(SLOT, &Secret::new("nsec1second")).unwrap(),
            WriteOutcome::Written
        );
        assert_eq!(store.read(SLOT).unwrap().unwrap().expose(), "nsec1second");
    }

    #[test]
    fn memory_store_write_once() {
        exercise_write_once(&MemorySecretStore::new());
    }

    #[test]
    fn file_store_write_once() {
        let tmp = TempDir::new().unwrap();
        exercise_write_once(&FileSecretStore::new(tmp.path().join("keys")));
    }

    #[test]
    fn file_store_treats_blank_file_as_empty() {
        let tmp = TempDir::new().unwrap();
        let store = FileSecretStore::new(tmp.path());
        std::fs::write(store.slot_path(SLOT), "   \n").unwrap();

        assert!(store.is_empty(SLOT).unwrap());
        assert_eq!(
            store.write_once(SLOT, &Secret::new("nsec1fresh")).unwrap(),
            WriteOutcome::Written
        );
        assert_eq!(store.read(SLOT).unwrap().unwrap().expose(), "nsec1fresh");
    }

    #[test]
    fn file_store_clear_missing_is_ok() {
        let tmp = TempDir::new().unwrap();
        let store = FileSecretStore::new(tmp.path().join("never-created"));
        store.clear(SLOT).unwrap();
        assert!(store.is_empty(SLOT).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn file_store_uses_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let store = FileSecretStore::new(tmp.path());
        store.write_once(SLOT, &Secret::new("nsec1secure")).unwrap();

        let mode = std::fs::metadata(store.slot_path(SLOT))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn concurrent_writers_populate_exactly_once() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FileSecretStore::new(tmp.path()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .write_once(SLOT, &Secret::new(format!("nsec1writer{i}")))
                        .unwrap()
                })
            })
            .collect();

        let written = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| *o == WriteOutcome::Written)
            .count();
        assert_eq!(written, 1);
        assert!(store
            .read(SLOT)
            .unwrap()
            .unwrap()
            .expose()
            .starts_with("nsec1writer"));
    }

    #[test]
    fn concurrent_writers_replace_blank_leftover_once() {
        for _ in 0..20 {
            let tmp = TempDir::new().unwrap();
            let store = FileSecretStore::new(tmp.path());
            std::fs::write(store.slot_path(SLOT), "   \n").unwrap();

            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let store = store.clone();
                    std::thread::spawn(move || {
                        let secret = Secret::new(format!("nsec1writer{i}"));
                        (secret.clone(), store.write_once(SLOT, &secret).unwrap())
                    })
                })
                .collect();

            let written: Vec<Secret> = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|(_, outcome)| *outcome == WriteOutcome::Written)
                .map(|(secret, _)| secret)
                .collect();
            assert_eq!(written.len(), 1);
            assert_eq!(store.read(SLOT).unwrap().as_ref(), Some(&written[0]));
        }
    }
}
