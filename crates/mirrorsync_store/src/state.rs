//! Committed collection state shared by the store implementations.

use crate::change_feed::{ChangeEvent, ChangeFeed};
use crate::entity::{Record, Syncable, SyncableDto};
use crate::error::StoreResult;
use crate::reconcile::{reconcile, ReconcileReport};
use parking_lot::{Mutex, RwLock};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::debug;

/// A committed version of the collection.
struct Committed<E> {
    sequence: u64,
    records: Arc<Vec<Record<E>>>,
}

/// Single-writer, many-reader collection with copy-on-write commits.
///
/// Readers clone an `Arc` of the committed records and never block on a
/// running reconciliation. Writers are serialized by `writer` and publish a
/// new version with a single pointer swap.
pub(crate) struct Collection<E> {
    committed: RwLock<Committed<E>>,
    writer: Mutex<()>,
    feed: ChangeFeed,
}

impl<E: Syncable> Collection<E> {
    pub(crate) fn new(sequence: u64, records: Vec<Record<E>>) -> Self {
        Self {
            committed: RwLock::new(Committed {
                sequence,
                records: Arc::new(records),
            }),
            writer: Mutex::new(()),
            feed: ChangeFeed::new(),
        }
    }

    /// Returns the latest committed records.
    pub(crate) fn records(&self) -> Arc<Vec<Record<E>>> {
        Arc::clone(&self.committed.read().records)
    }

    /// Returns the latest commit sequence.
    pub(crate) fn sequence(&self) -> u64 {
        self.committed.read().sequence
    }

    pub(crate) fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    /// Reconciles against `snapshot` and commits the result.
    ///
    /// `persist` runs before the new version becomes visible; if it fails the
    /// committed version is left untouched and no change events are emitted.
    pub(crate) fn reconcile_and_commit<D, F>(
        &self,
        snapshot: &[D],
        persist: F,
    ) -> StoreResult<ReconcileReport>
    where
        D: SyncableDto<E>,
        F: FnOnce(u64, &[Record<E>]) -> StoreResult<()>,
    {
        let _writer = self.writer.lock();

        let (base_sequence, current) = {
            let committed = self.committed.read();
            (committed.sequence, Arc::clone(&committed.records))
        };

        let reconciliation = reconcile(&current, snapshot)?;
        let report = reconciliation.report;
        if report.is_noop() {
            debug!(
                collection = E::COLLECTION,
                unchanged = report.unchanged,
                "reconcile is a no-op"
            );
            return Ok(report);
        }

        let sequence = base_sequence + 1;
        persist(sequence, &reconciliation.records)?;

        {
            let mut committed = self.committed.write();
            committed.sequence = sequence;
            committed.records = Arc::new(reconciliation.records);
        }

        debug!(
            collection = E::COLLECTION,
            sequence,
            inserted = report.inserted,
            updated = report.updated,
            deleted = report.deleted,
            "reconcile committed"
        );

        let events = reconciliation
            .changes
            .into_iter()
            .map(|(storage_key, identity_key, change_type)| ChangeEvent {
                sequence,
                collection: E::COLLECTION,
                storage_key,
                identity_key,
                change_type,
            })
            .collect();
        self.feed.emit_batch(events);

        Ok(report)
    }
}
