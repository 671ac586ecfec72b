//! Local store contract.

use crate::entity::{Record, Syncable, SyncableDto};
use crate::error::StoreResult;
use crate::key::StorageKey;
use crate::reconcile::ReconcileReport;
use std::collections::BTreeSet;

/// A local, persistent collection of entities of type `E`.
///
/// Stores are the only shared mutable resource of a sync engine. All writes
/// happen inside [`LocalStore::reconcile`]; reads may happen concurrently at
/// any time.
///
/// # Invariants
///
/// - `reconcile` is a single transaction: readers see either the collection
///   before the call or the fully reconciled collection, never a mix
/// - A failed `reconcile` leaves the collection unchanged
/// - Storage keys of matched records are preserved
pub trait LocalStore<E: Syncable>: Send + Sync {
    /// Reconciles the collection against a full remote snapshot.
    ///
    /// Matched records are updated in place, new identity keys are inserted
    /// and records absent from the snapshot are deleted.
    fn reconcile<D: SyncableDto<E>>(&self, snapshot: &[D]) -> StoreResult<ReconcileReport>;

    /// Returns all committed records.
    fn records(&self) -> StoreResult<Vec<Record<E>>>;

    /// Returns the record with the given storage key.
    fn get(&self, storage_key: StorageKey) -> StoreResult<Option<Record<E>>> {
        Ok(self
            .records()?
            .into_iter()
            .find(|r| r.storage_key() == storage_key))
    }

    /// Returns the record with the given identity key.
    fn get_by_identity(&self, identity_key: &str) -> StoreResult<Option<Record<E>>> {
        Ok(self
            .records()?
            .into_iter()
            .find(|r| r.identity_key() == identity_key))
    }

    /// Returns the set of identity keys currently stored.
    fn identity_keys(&self) -> StoreResult<BTreeSet<String>> {
        Ok(self
            .records()?
            .iter()
            .map(|r| r.identity_key().to_owned())
            .collect())
    }

    /// Returns the number of stored records.
    fn len(&self) -> StoreResult<usize> {
        Ok(self.records()?.len())
    }

    /// Returns true if the store holds no records.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}
