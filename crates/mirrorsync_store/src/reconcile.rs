//! Upsert/prune reconciliation of a local collection against a snapshot.
//!
//! Reconciliation makes the local collection converge to exactly the set of
//! identity keys carried by a remote snapshot:
//!
//! 1. Every current record starts in a "to-remove" set.
//! 2. Each snapshot DTO is matched by identity key. A match leaves the
//!    to-remove set and is updated in place, keeping its storage key. No
//!    match inserts a new record with a fresh storage key.
//! 3. Whatever remains in the to-remove set is deleted.
//!
//! The algorithm works on a private copy of the collection. Stores commit
//! the returned records atomically, or discard them on error.

use crate::change_feed::ChangeType;
use crate::entity::{Record, Syncable, SyncableDto};
use crate::error::{StoreError, StoreResult};
use crate::key::StorageKey;
use std::collections::{HashMap, HashSet};

/// Counts of what a reconciliation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records created for identity keys not present locally.
    pub inserted: usize,
    /// Matched records whose attributes changed.
    pub updated: usize,
    /// Matched records whose attributes were already current.
    pub unchanged: usize,
    /// Records absent from the snapshot that were removed.
    pub deleted: usize,
}

impl ReconcileReport {
    /// Returns true if the reconciliation changed nothing.
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.deleted == 0
    }

    /// Number of records in the collection after reconciliation.
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}

/// The outcome of reconciling a collection, ready to be committed.
#[derive(Debug, Clone)]
pub struct Reconciliation<E> {
    /// The full collection after reconciliation.
    pub records: Vec<Record<E>>,
    /// Summary counts.
    pub report: ReconcileReport,
    /// Per-record changes, in the order they were applied.
    pub changes: Vec<(StorageKey, String, ChangeType)>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Reconciles `current` against `snapshot`.
///
/// Duplicate identity keys in the snapshot collapse onto one record, the last
/// DTO winning. Duplicate identity keys already present locally are repaired:
/// the first record is matched and the rest are pruned.
///
/// # Errors
///
/// Returns [`StoreError::IdentityMismatch`] if applying a DTO leaves the
/// entity with a different identity key than the DTO reported. The caller
/// must then discard the whole reconciliation.
pub fn reconcile<E, D>(current: &[Record<E>], snapshot: &[D]) -> StoreResult<Reconciliation<E>>
where
    E: Syncable,
    D: SyncableDto<E>,
{
    let mut records: Vec<Record<E>> = current.to_vec();

    let mut by_identity: HashMap<String, usize> = HashMap::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        by_identity
            .entry(record.identity_key().to_owned())
            .or_insert(idx);
    }

    let mut to_remove: HashSet<StorageKey> = records.iter().map(Record::storage_key).collect();
    let mut outcomes: HashMap<StorageKey, Outcome> = HashMap::with_capacity(snapshot.len());
    let mut order: Vec<StorageKey> = Vec::with_capacity(snapshot.len());

    for dto in snapshot {
        let identity = dto.identity_key();

        match by_identity.get(&identity) {
            Some(&idx) => {
                let record = &mut records[idx];
                let key = record.storage_key();
                to_remove.remove(&key);

                let changed = dto.apply(record.entity_mut());
                check_identity(&identity, record)?;

                let outcome = outcomes.entry(key).or_insert_with(|| {
                    order.push(key);
                    Outcome::Unchanged
                });
                if changed && *outcome == Outcome::Unchanged {
                    *outcome = Outcome::Updated;
                }
            }
            None => {
                let record = Record::new(dto.build());
                check_identity(&identity, &record)?;

                let key = record.storage_key();
                outcomes.insert(key, Outcome::Inserted);
                order.push(key);
                by_identity.insert(identity, records.len());
                records.push(record);
            }
        }
    }

    let mut report = ReconcileReport::default();
    let mut changes = Vec::new();

    let positions: HashMap<StorageKey, usize> = records
        .iter()
        .enumerate()
        .map(|(idx, record)| (record.storage_key(), idx))
        .collect();

    for key in &order {
        let record = positions
            .get(key)
            .map(|&idx| &records[idx])
            .ok_or_else(|| StoreError::aborted("matched record vanished during reconcile"))?;
        match outcomes[key] {
            Outcome::Inserted => {
                report.inserted += 1;
                changes.push((*key, record.identity_key().to_owned(), ChangeType::Insert));
            }
            Outcome::Updated => {
                report.updated += 1;
                changes.push((*key, record.identity_key().to_owned(), ChangeType::Update));
            }
            Outcome::Unchanged => report.unchanged += 1,
        }
    }

    records.retain(|record| {
        if to_remove.contains(&record.storage_key()) {
            report.deleted += 1;
            changes.push((
                record.storage_key(),
                record.identity_key().to_owned(),
                ChangeType::Delete,
            ));
            false
        } else {
            true
        }
    });

    Ok(Reconciliation {
        records,
        report,
        changes,
    })
}

fn check_identity<E: Syncable>(expected: &str, record: &Record<E>) -> StoreResult<()> {
    if record.identity_key() == expected {
        Ok(())
    } else {
        Err(StoreError::IdentityMismatch {
            expected: expected.to_owned(),
            actual: record.identity_key().to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::{Item, ItemDto};
    use std::collections::BTreeSet;

    fn records(items: &[(&str, &str)]) -> Vec<Record<Item>> {
        items
            .iter()
            .map(|(code, label)| Record::new(ItemDto::new(code, label).build()))
            .collect()
    }

    fn keys(records: &[Record<Item>]) -> BTreeSet<String> {
        records.iter().map(|r| r.identity_key().to_owned()).collect()
    }

    #[test]
    fn upsert_and_prune() {
        let current = records(&[("A", "a"), ("B", "b")]);
        let b_key = current[1].storage_key();

        let snapshot = vec![ItemDto::new("B", "b2"), ItemDto::new("C", "c")];
        let result = reconcile(&current, &snapshot).unwrap();

        assert_eq!(
            keys(&result.records),
            ["B", "C"].iter().map(|s| s.to_string()).collect()
        );
        let b = result.records.iter().find(|r| r.identity_key() == "B").unwrap();
        assert_eq!(b.storage_key(), b_key);
        assert_eq!(b.entity().label, "b2");

        let c = result.records.iter().find(|r| r.identity_key() == "C").unwrap();
        assert_ne!(c.storage_key(), current[0].storage_key());
        assert_ne!(c.storage_key(), b_key);

        assert_eq!(
            result.report,
            ReconcileReport {
                inserted: 1,
                updated: 1,
                unchanged: 0,
                deleted: 1,
            }
        );
    }

    #[test]
    fn identical_snapshot_is_noop() {
        let current = records(&[("A", "a"), ("B", "b")]);
        let snapshot = vec![ItemDto::new("A", "a"), ItemDto::new("B", "b")];

        let result = reconcile(&current, &snapshot).unwrap();
        assert!(result.report.is_noop());
        assert_eq!(result.report.unchanged, 2);
        assert!(result.changes.is_empty());
        assert_eq!(result.records, current);
    }

    #[test]
    fn empty_snapshot_deletes_everything() {
        let current = records(&[("A", "a"), ("B", "b")]);
        let result = reconcile::<Item, ItemDto>(&current, &[]).unwrap();
        assert!(result.records.is_empty());
        assert_eq!(result.report.deleted, 2);
    }

    #[test]
    fn empty_store_inserts_everything() {
        let snapshot = vec![ItemDto::new("A", "a"), ItemDto::new("B", "b")];
        let result = reconcile(&[], &snapshot).unwrap();
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.report.inserted, 2);
        assert_eq!(
            result
                .changes
                .iter()
                .map(|(_, k, t)| (k.as_str(), *t))
                .collect::<Vec<_>>(),
            vec![("A", ChangeType::Insert), ("B", ChangeType::Insert)]
        );
    }

    #[test]
    fn duplicate_snapshot_keys_collapse() {
        let snapshot = vec![ItemDto::new("A", "first"), ItemDto::new("A", "second")];
        let result = reconcile(&[], &snapshot).unwrap();

        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].entity().label, "second");
        assert_eq!(result.report.inserted, 1);
        assert_eq!(result.report.updated, 0);
    }

    #[test]
    fn duplicate_local_keys_are_repaired() {
        let current = records(&[("A", "one"), ("A", "two")]);
        let first = current[0].storage_key();

        let result = reconcile(&current, &[ItemDto::new("A", "one")]).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].storage_key(), first);
        assert_eq!(result.report.deleted, 1);
    }

    #[test]
    fn identity_mismatch_aborts() {
        struct Liar;
        impl SyncableDto<Item> for Liar {
            fn identity_key(&self) -> String {
                "X".into()
            }
            fn apply(&self, entity: &mut Item) -> bool {
                entity.code = "Y".into();
                true
            }
        }

        let current = records(&[("A", "a")]);
        let err = reconcile(&current, &[Liar]).unwrap_err();
        assert!(matches!(err, StoreError::IdentityMismatch { .. }));
    }
}
