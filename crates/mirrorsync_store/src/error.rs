//! Error types for local store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or reconciling a local store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// CBOR encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// The store file is corrupted or was written for another collection.
    #[error("store corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// The store file was written by an unsupported format version.
    #[error("unsupported store format version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found on disk.
        found: u16,
        /// Version this build understands.
        expected: u16,
    },

    /// Another process holds the store lock.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// The store directory does not exist.
    #[error("store directory does not exist: {path}")]
    MissingDirectory {
        /// The missing path.
        path: String,
    },

    /// A DTO produced an entity whose identity key differs from the DTO's own.
    #[error("identity mismatch: DTO key {expected:?} produced entity key {actual:?}")]
    IdentityMismatch {
        /// Identity key reported by the DTO.
        expected: String,
        /// Identity key of the entity after applying the DTO.
        actual: String,
    },

    /// The transaction was aborted.
    #[error("transaction aborted: {reason}")]
    Aborted {
        /// Reason for the abort.
        reason: String,
    },
}

impl StoreError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates an aborted-transaction error.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StoreError::UnsupportedVersion {
            found: 9,
            expected: 1,
        };
        assert_eq!(
            err.to_string(),
            "unsupported store format version 9 (expected 1)"
        );

        let err = StoreError::IdentityMismatch {
            expected: "BCN".into(),
            actual: "MAD".into(),
        };
        assert!(err.to_string().contains("BCN"));
        assert!(err.to_string().contains("MAD"));
    }

    #[test]
    fn io_conversion() {
        let err: StoreError = io::Error::other("disk full").into();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
