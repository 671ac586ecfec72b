//! Property tests for reconciliation convergence.

use mirrorsync_store::{LocalStore, MemoryStore, Record, Syncable, SyncableDto};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Station {
    code: String,
    capacity: u32,
}

impl Syncable for Station {
    const COLLECTION: &'static str = "stations";

    fn identity_key(&self) -> &str {
        &self.code
    }
}

#[derive(Debug, Clone)]
struct StationDto {
    code: String,
    capacity: u32,
}

impl SyncableDto<Station> for StationDto {
    fn identity_key(&self) -> String {
        self.code.clone()
    }

    fn apply(&self, entity: &mut Station) -> bool {
        let mut changed = false;
        if entity.code != self.code {
            entity.code = self.code.clone();
            changed = true;
        }
        if entity.capacity != self.capacity {
            entity.capacity = self.capacity;
            changed = true;
        }
        changed
    }
}

fn code() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["A", "B", "C", "D", "E", "F", "G", "H"]).prop_map(String::from)
}

fn dtos() -> impl Strategy<Value = Vec<StationDto>> {
    prop::collection::vec(
        (code(), 0u32..4).prop_map(|(code, capacity)| StationDto { code, capacity }),
        0..12,
    )
}

fn local() -> impl Strategy<Value = Vec<Record<Station>>> {
    prop::collection::btree_map(code(), 0u32..4, 0..8).prop_map(|m| {
        m.into_iter()
            .map(|(code, capacity)| Record::new(Station { code, capacity }))
            .collect()
    })
}

proptest! {
    #[test]
    fn converges_to_snapshot_identity_set(initial in local(), snapshot in dtos()) {
        let before: BTreeMap<String, _> = initial
            .iter()
            .map(|r| (r.identity_key().to_owned(), r.storage_key()))
            .collect();
        let store = MemoryStore::with_records(initial);

        store.reconcile(&snapshot).unwrap();

        let expected: BTreeSet<String> = snapshot.iter().map(|d| d.code.clone()).collect();
        prop_assert_eq!(store.identity_keys().unwrap(), expected);

        let records = store.records().unwrap();
        prop_assert_eq!(records.len(), store.identity_keys().unwrap().len());

        for record in &records {
            if let Some(original) = before.get(record.identity_key()) {
                prop_assert_eq!(record.storage_key(), *original);
            }
            let last = snapshot
                .iter()
                .rev()
                .find(|d| d.code == record.identity_key())
                .unwrap();
            prop_assert_eq!(record.entity().capacity, last.capacity);
        }
    }

    #[test]
    fn reconcile_is_idempotent(initial in local(), snapshot in dtos()) {
        let store = MemoryStore::with_records(initial);
        store.reconcile(&snapshot).unwrap();
        let first = store.records().unwrap();

        // Duplicate keys within one snapshot may flip attributes back and
        // forth, but never insert or delete on a second pass.
        let report = store.reconcile(&snapshot).unwrap();
        prop_assert_eq!(report.inserted, 0);
        prop_assert_eq!(report.deleted, 0);
        prop_assert_eq!(store.records().unwrap(), first);
    }
}

#[test]
fn scenario_ab_to_bc() {
    let store = MemoryStore::with_records(vec![
        Record::new(Station { code: "A".into(), capacity: 1 }),
        Record::new(Station { code: "B".into(), capacity: 1 }),
    ]);
    let a_key = store.get_by_identity("A").unwrap().unwrap().storage_key();
    let b_key = store.get_by_identity("B").unwrap().unwrap().storage_key();

    let report = store
        .reconcile(&[
            StationDto { code: "B".into(), capacity: 2 },
            StationDto { code: "C".into(), capacity: 3 },
        ])
        .unwrap();

    assert_eq!((report.inserted, report.updated, report.deleted), (1, 1, 1));
    assert!(store.get(a_key).unwrap().is_none());
    assert_eq!(store.get_by_identity("B").unwrap().unwrap().storage_key(), b_key);
    let c_key = store.get_by_identity("C").unwrap().unwrap().storage_key();
    assert_ne!(c_key, a_key);
    assert_ne!(c_key, b_key);
    assert_eq!(
        store.identity_keys().unwrap(),
        ["B", "C"].iter().map(|s| s.to_string()).collect()
    );
}
