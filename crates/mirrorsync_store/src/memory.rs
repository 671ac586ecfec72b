//! In-memory local store.

use crate::change_feed::ChangeEvent;
use crate::entity::{Record, Syncable, SyncableDto};
use crate::error::StoreResult;
use crate::reconcile::ReconcileReport;
use crate::state::Collection;
use crate::store::LocalStore;
use std::sync::mpsc::Receiver;

/// An in-memory local store.
///
/// This store keeps the collection in memory and is suitable for:
/// - Unit and integration tests
/// - Ephemeral mirrors that don't need to survive a restart
///
/// Reconciliations are copy-on-write: the new collection is built aside and
/// published with a single swap, so concurrent readers never observe a
/// partially applied snapshot.
///
/// # Example
///
/// ```rust,ignore
/// use mirrorsync_store::{LocalStore, MemoryStore};
///
/// let store = MemoryStore::<City>::new();
/// let report = store.reconcile(&dtos)?;
/// assert_eq!(store.len()?, report.total());
/// ```
pub struct MemoryStore<E> {
    collection: Collection<E>,
}

impl<E: Syncable> MemoryStore<E> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Creates a store holding pre-existing records.
    ///
    /// Useful for seeding tests with known storage keys.
    #[must_use]
    pub fn with_records(records: Vec<Record<E>>) -> Self {
        Self {
            collection: Collection::new(0, records),
        }
    }

    /// Returns the sequence number of the latest commit.
    pub fn sequence(&self) -> u64 {
        self.collection.sequence()
    }

    /// Subscribes to committed changes.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.collection.subscribe()
    }
}

impl<E: Syncable> Default for MemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Syncable> LocalStore<E> for MemoryStore<E> {
    fn reconcile<D: SyncableDto<E>>(&self, snapshot: &[D]) -> StoreResult<ReconcileReport> {
        self.collection
            .reconcile_and_commit(snapshot, |_sequence, _records| Ok(()))
    }

    fn records(&self) -> StoreResult<Vec<Record<E>>> {
        Ok(self.collection.records().as_ref().clone())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.collection.records().len())
    }
}

impl<E: Syncable> std::fmt::Debug for MemoryStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("collection", &E::COLLECTION)
            .field("sequence", &self.sequence())
            .finish_non_exhaustive()
    }
}
