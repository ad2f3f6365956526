//! Secret material carried by side-effect updates.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

/// A slot in the secret store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretSlot {
    /// The account's private key (nsec).
    AccountKey,
}

impl SecretSlot {
    /// Stable name, used as the file name by file-backed stores.
    pub fn name(&self) -> &'static str {
        match self {
            SecretSlot::AccountKey => "account_key",
        }
    }
}

impl fmt::Display for SecretSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Secret text that is wiped from memory on drop.
///
/// `Debug` never prints the value and the type is deliberately not
/// serializable, so it cannot leak into state snapshots or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    /// Wraps secret text.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Returns the secret text.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the secret with surrounding whitespace removed.
    pub fn trimmed(&self) -> Secret {
        Secret::new(self.0.trim())
    }

    /// Returns true if the secret has no non-whitespace content.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Secret::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Secret::new(value)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(<{} bytes redacted>)", self.0.len())
    }
}
