//! One-shot sync command.

use super::RemoteOptions;
use crate::catalog::CatalogEntity;
use crate::error::{CliError, CliResult};
use mirrorsync_engine::{SyncConfig, SyncEngine, SyncStats};
use mirrorsync_store::{FileStore, LocalStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Runs one sync of `E` into the store at `data_dir`.
///
/// Waits up to `timeout` for the remote to become reachable and the run to
/// finish.
pub async fn run<E: CatalogEntity>(
    data_dir: &Path,
    remote: &RemoteOptions,
    timeout: Duration,
) -> CliResult<SyncStats> {
    let store = Arc::new(FileStore::<E>::open(data_dir, true)?);
    let reachability = remote.reachability().await;
    let engine = SyncEngine::new(
        SyncConfig::default(),
        remote.source::<E>(),
        Arc::clone(&store),
        reachability.as_ref(),
    );

    let outcome = tokio::time::timeout(timeout, engine.sync_and_wait()).await;
    let stats = engine.stats();
    engine.shutdown().await;

    match outcome {
        Err(_) => return Err(CliError::Timeout(timeout)),
        Ok(Err(error)) => return Err(CliError::Sync(error)),
        Ok(Ok(())) => {}
    }

    let records = store.len()?;
    info!(
        collection = E::COLLECTION,
        records,
        sequence = store.sequence(),
        "sync complete"
    );
    println!(
        "{}: {} records (inserted {}, updated {}, deleted {})",
        E::COLLECTION,
        records,
        stats.records_inserted,
        stats.records_updated,
        stats.records_deleted
    );
    Ok(stats)
}
