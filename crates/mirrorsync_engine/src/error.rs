//! Error types for the sync engine.

use mirrorsync_store::StoreError;
use std::fmt;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can end a sync run.
///
/// None of these are fatal to the engine: a failed run is recorded as the
/// engine's last error and the engine returns to idle.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Transport or connectivity failure while fetching.
    #[error("network error: {message}")]
    Network {
        /// Error message.
        message: String,
        /// Whether a later attempt may succeed.
        retryable: bool,
    },

    /// The remote payload could not be decoded.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// The local transaction failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// The run's worker task failed unexpectedly.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Creates a retryable network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable network error.
    pub fn network_fatal(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns the error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Network { .. } => ErrorKind::Network,
            SyncError::Decoding(_) => ErrorKind::Decoding,
            SyncError::Persistence(_) => ErrorKind::Persistence,
            SyncError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if a later run may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network { retryable, .. } => *retryable,
            SyncError::Persistence(StoreError::Io(_)) => true,
            _ => false,
        }
    }
}

/// Category of a run failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport or connectivity failure.
    Network,
    /// Malformed remote payload.
    Decoding,
    /// Local transaction failure.
    Persistence,
    /// Worker task failure.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Network => "network",
            ErrorKind::Decoding => "decoding",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// The observable record of a failed run.
///
/// Unlike [`SyncError`] this is cheap to clone and comparable, so it can be
/// published to any number of observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Error category.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Number of the run that failed (1-based).
    pub run: u64,
    /// Whether a later run may succeed without intervention.
    pub retryable: bool,
}

impl ErrorInfo {
    /// Captures a run failure.
    pub fn from_error(error: &SyncError, run: u64) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            run,
            retryable: error.is_retryable(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run {} failed: {}", self.run, self.message)
    }
}
