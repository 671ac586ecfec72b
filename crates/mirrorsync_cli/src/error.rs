//! CLI error type.

use mirrorsync_engine::ErrorInfo;
use mirrorsync_store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Error, Debug)]
pub enum CliError {
    /// The local store could not be opened or read.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The sync run failed.
    #[error("sync failed: {0}")]
    Sync(ErrorInfo),

    /// The run did not finish in time, typically because the remote is
    /// unreachable.
    #[error("sync did not complete within {0:?}")]
    Timeout(Duration),

    /// Output could not be encoded.
    #[error("output error: {0}")]
    Output(#[from] serde_json::Error),

    /// Signal handling failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;
