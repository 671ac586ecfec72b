//! Entity and identity model.

use crate::key::StorageKey;
use serde::{Deserialize, Serialize};

/// An entity type that can be mirrored from a remote source.
///
/// Every entity exposes an identity key: a business-level key supplied by
/// the remote source (a city code, a country code) that is unique among all
/// entities of the type. The identity key is what matches a local record to
/// a snapshot entry; it is independent of the record's [`StorageKey`].
///
/// `Default` provides the blank entity a DTO is applied to when a new record
/// is created.
pub trait Syncable: Clone + Default + Send + Sync + 'static {
    /// Name of the collection holding entities of this type.
    const COLLECTION: &'static str;

    /// Returns the identity key of this entity.
    fn identity_key(&self) -> &str;
}

/// A remote representation of an entity of type `E`.
///
/// A DTO carries enough data to compute the identity key and every attribute
/// of the entity. Applying a DTO must leave the entity with the same identity
/// key the DTO reports.
pub trait SyncableDto<E: Syncable>: Send + Sync {
    /// Returns the identity key this DTO describes.
    fn identity_key(&self) -> String;

    /// Copies the DTO's attributes onto `entity`.
    ///
    /// Implementations should only write fields that differ and must return
    /// `true` if any field changed.
    fn apply(&self, entity: &mut E) -> bool;

    /// Builds a fresh entity from this DTO.
    fn build(&self) -> E {
        let mut entity = E::default();
        self.apply(&mut entity);
        entity
    }
}

/// A stored entity together with its storage key.
///
/// The storage key is assigned when the record is created and cannot be
/// changed afterwards; only the entity's attributes are mutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record<E> {
    storage_key: StorageKey,
    entity: E,
}

impl<E: Syncable> Record<E> {
    /// Creates a record with a fresh storage key.
    pub fn new(entity: E) -> Self {
        Self::with_key(StorageKey::new(), entity)
    }

    /// Creates a record with an explicit storage key.
    pub fn with_key(storage_key: StorageKey, entity: E) -> Self {
        Self {
            storage_key,
            entity,
        }
    }

    /// Returns the storage key.
    pub fn storage_key(&self) -> StorageKey {
        self.storage_key
    }

    /// Returns the identity key of the stored entity.
    pub fn identity_key(&self) -> &str {
        self.entity.identity_key()
    }

    /// Returns the stored entity.
    pub fn entity(&self) -> &E {
        &self.entity
    }

    /// Consumes the record, returning the entity.
    pub fn into_entity(self) -> E {
        self.entity
    }

    pub(crate) fn entity_mut(&mut self) -> &mut E {
        &mut self.entity
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{Item, ItemDto};
    use super::*;

    #[test]
    fn build_applies_all_fields() {
        let item = ItemDto::new("BCN", "Barcelona").build();
        assert_eq!(item.code, "BCN");
        assert_eq!(item.label, "Barcelona");
    }

    #[test]
    fn apply_reports_changes() {
        let dto = ItemDto::new("BCN", "Barcelona");
        let mut item = dto.build();
        assert!(!dto.apply(&mut item));

        let renamed = ItemDto::new("BCN", "Barna");
        assert!(renamed.apply(&mut item));
        assert_eq!(item.label, "Barna");
    }

    #[test]
    fn record_keeps_storage_key() {
        let key = StorageKey::new();
        let mut record = Record::with_key(key, ItemDto::new("A", "a").build());
        ItemDto::new("A", "b").apply(record.entity_mut());
        assert_eq!(record.storage_key(), key);
        assert_eq!(record.identity_key(), "A");
        assert_eq!(record.entity().label, "b");
    }

    #[test]
    fn record_new_assigns_fresh_key() {
        let a = Record::new(Item::default());
        let b = Record::new(Item::default());
        assert_ne!(a.storage_key(), b.storage_key());
    }
}
