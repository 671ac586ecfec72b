//! Storage key.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Local-only identifier of a stored record.
///
/// Storage keys are 128-bit UUIDs that are:
/// - Generated once, when a record is first inserted locally
/// - Never recomputed from remote data
/// - Never reused
///
/// They decouple local storage identity from the remote business identity,
/// so a record can be updated in place without being replaced.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(Uuid);

impl StorageKey {
    /// Creates a new random storage key.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a storage key from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Converts to a UUID.
    #[must_use]
    pub const fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for StorageKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageKey({})", self.0)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for StorageKey {
    fn from(uuid: Uuid) -> Self {
        Self::from_uuid(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_unique() {
        assert_ne!(StorageKey::new(), StorageKey::new());
    }

    #[test]
    fn uuid_conversion() {
        let uuid = Uuid::new_v4();
        assert_eq!(StorageKey::from_uuid(uuid).to_uuid(), uuid);
    }

    #[test]
    fn display_is_hyphenated_uuid() {
        let key = StorageKey::from_uuid(Uuid::nil());
        assert_eq!(key.to_string(), "00000000-0000-0000-0000-000000000000");
    }
}
