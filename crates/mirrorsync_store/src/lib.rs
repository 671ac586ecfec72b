//! # mirrorsync store
//!
//! Entity identity model and transactional local stores for mirrorsync.
//!
//! This crate provides:
//! - Storage keys and the identity-key abstraction ([`Syncable`], [`SyncableDto`])
//! - The [`LocalStore`] contract used by the sync engine
//! - The upsert/prune reconciliation algorithm
//! - An in-memory store and a file-backed CBOR store
//! - A change feed emitting committed record changes
//!
//! ## Key Invariants
//!
//! - At most one record exists per identity key
//! - A record's storage key never changes once assigned
//! - After a reconciliation commits, the identity-key set equals the snapshot's
//! - Readers observe either the pre-commit or the post-commit collection

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod entity;
mod error;
mod file;
mod key;
mod memory;
mod reconcile;
mod state;
mod store;

pub use change_feed::{ChangeEvent, ChangeFeed, ChangeType};
pub use entity::{Record, Syncable, SyncableDto};
pub use error::{StoreError, StoreResult};
pub use file::{FileStore, FORMAT_VERSION};
pub use key::StorageKey;
pub use memory::MemoryStore;
pub use reconcile::{reconcile, ReconcileReport, Reconciliation};
pub use store::LocalStore;
