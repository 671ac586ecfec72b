//! Long-running sync command.

use super::RemoteOptions;
use crate::catalog::CatalogEntity;
use crate::error::CliResult;
use mirrorsync_engine::{ErrorInfo, SyncConfig, SyncEngine, SyncStatus};
use mirrorsync_store::{FileStore, LocalStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Notable differences between two consecutive status snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Transition {
    Reachable(bool),
    Started,
    Succeeded,
    Failed(ErrorInfo),
}

fn transitions(prev: &SyncStatus, next: &SyncStatus) -> Vec<Transition> {
    let mut out = Vec::new();
    if prev.is_reachable != next.is_reachable {
        out.push(Transition::Reachable(next.is_reachable));
    }
    if next.runs_completed > prev.runs_completed {
        out.push(match &next.last_error {
            Some(error) => Transition::Failed(error.clone()),
            None => Transition::Succeeded,
        });
    }
    // A run can finish and the next one start between two snapshots.
    if next.is_syncing && (!prev.is_syncing || next.runs_completed > prev.runs_completed) {
        out.push(Transition::Started);
    }
    out
}

/// Keeps the store for `E` in sync until Ctrl-C.
///
/// Syncs once on start, then on every `config.refresh_interval`.
pub async fn run<E: CatalogEntity>(
    data_dir: &Path,
    remote: &RemoteOptions,
    config: SyncConfig,
) -> CliResult<()> {
    let store = Arc::new(FileStore::<E>::open(data_dir, true)?);
    let reachability = remote.reachability().await;
    let engine = SyncEngine::new(
        config,
        remote.source::<E>(),
        Arc::clone(&store),
        reachability.as_ref(),
    );

    let mut statuses = engine.subscribe();
    let mut prev = engine.status();
    engine.start();
    engine.request_sync();
    info!(collection = E::COLLECTION, "watching, press Ctrl-C to stop");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                break;
            }
            next = statuses.next() => {
                let Some(next) = next else { break };
                for transition in transitions(&prev, &next) {
                    match transition {
                        Transition::Reachable(reachable) => {
                            info!(collection = E::COLLECTION, reachable, "reachability changed");
                        }
                        Transition::Started => info!(collection = E::COLLECTION, "sync started"),
                        Transition::Succeeded => {
                            let records = store.len()?;
                            info!(collection = E::COLLECTION, records, "sync succeeded");
                        }
                        Transition::Failed(error) => {
                            warn!(
                                collection = E::COLLECTION,
                                %error,
                                retryable = error.retryable,
                                "sync failed"
                            );
                        }
                    }
                }
                prev = next;
            }
        }
    }

    let stats = engine.stats();
    engine.shutdown().await;
    info!(
        collection = E::COLLECTION,
        runs = stats.runs_started,
        failed = stats.runs_failed,
        "stopped"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirrorsync_engine::{ErrorKind, SyncError};

    fn status(syncing: bool, completed: u64) -> SyncStatus {
        SyncStatus {
            is_syncing: syncing,
            is_reachable: true,
            runs_completed: completed,
            ..SyncStatus::default()
        }
    }

    #[test]
    fn start_and_success() {
        assert_eq!(
            transitions(&status(false, 0), &status(true, 0)),
            vec![Transition::Started]
        );
        assert_eq!(
            transitions(&status(true, 0), &status(false, 1)),
            vec![Transition::Succeeded]
        );
    }

    #[test]
    fn failure_carries_error() {
        let error = ErrorInfo::from_error(&SyncError::network("offline"), 1);
        let next = SyncStatus {
            last_error: Some(error.clone()),
            ..status(false, 1)
        };
        let out = transitions(&status(true, 0), &next);
        assert_eq!(out, vec![Transition::Failed(error)]);
        assert!(matches!(&out[0], Transition::Failed(e) if e.kind == ErrorKind::Network));
    }

    #[test]
    fn back_to_back_runs() {
        assert_eq!(
            transitions(&status(true, 0), &status(true, 1)),
            vec![Transition::Succeeded, Transition::Started]
        );
    }

    #[test]
    fn reachability_changes() {
        let offline = SyncStatus {
            is_reachable: false,
            ..status(false, 0)
        };
        assert_eq!(
            transitions(&status(false, 0), &offline),
            vec![Transition::Reachable(false)]
        );
        assert!(transitions(&offline, &offline).is_empty());
    }
}
