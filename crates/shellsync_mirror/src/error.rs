//! Error types for the client mirror.

use thiserror::Error;

/// Result type for mirror operations.
pub type MirrorResult<T> = Result<T, MirrorError>;

/// Errors that can occur while reconciling with the engine.
///
/// None of these reach the UI: the mirror either converges or retries.
#[derive(Error, Debug)]
pub enum MirrorError {
    /// The engine failed to produce a snapshot.
    #[error("engine error: {message}")]
    Engine {
        /// Error message.
        message: String,
        /// Whether the pull can be retried.
        retryable: bool,
    },

    /// The secret store rejected an operation.
    #[error("secret store error: {0}")]
    SecretStore(String),

    /// I/O error from a file-backed collaborator.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation was cancelled by shutdown.
    #[error("operation cancelled")]
    Cancelled,

    /// A pull kept failing until the retry budget ran out.
    #[error("pull failed after {attempts} attempts")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
    },

    /// The mirror's actor is no longer running.
    #[error("mirror is shut down")]
    Disconnected,

    /// Configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MirrorError {
    /// Creates a retryable engine error.
    pub fn engine_retryable(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable engine error.
    pub fn engine_fatal(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            MirrorError::Engine { retryable, .. } => *retryable,
            MirrorError::Io(_) => true,
            _ => false,
        }
    }
}
