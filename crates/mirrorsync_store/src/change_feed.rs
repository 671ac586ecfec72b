//! Change feed for observing committed reconciliations.
//!
//! The change feed emits one event per record touched by a committed
//! reconciliation, enabling:
//! - Reactive UI updates
//! - Derived caches that follow the local collection
//!
//! # Usage
//!
//! ```rust,ignore
//! let store = MemoryStore::<City>::new();
//! let receiver = store.subscribe();
//!
//! std::thread::spawn(move || {
//!     while let Ok(event) = receiver.recv() {
//!         println!("{:?} {}", event.change_type, event.identity_key);
//!     }
//! });
//! ```

use crate::key::StorageKey;
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// Type of change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// A record was created for a new identity key.
    Insert,
    /// An existing record's attributes changed.
    Update,
    /// A record absent from the snapshot was removed.
    Delete,
}

/// A single change event from the change feed.
///
/// Events are emitted only after a reconciliation commits, and all events of
/// one commit share its sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Commit sequence number.
    pub sequence: u64,
    /// Collection name.
    pub collection: &'static str,
    /// Storage key of the affected record.
    pub storage_key: StorageKey,
    /// Identity key of the affected record.
    pub identity_key: String,
    /// Type of change.
    pub change_type: ChangeType,
}

/// Distributes committed changes to subscribers.
///
/// The change feed:
/// - Emits only committed changes
/// - Preserves commit order
/// - Supports multiple subscribers
/// - Drops subscribers whose receivers were dropped
#[derive(Debug, Default)]
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<ChangeEvent>>>,
}

impl ChangeFeed {
    /// Creates a new change feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to the change feed.
    ///
    /// Returns a receiver that will receive all future change events.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits all events of one commit, in order.
    pub fn emit_batch(&self, events: Vec<ChangeEvent>) {
        if events.is_empty() {
            return;
        }

        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| events.iter().all(|event| tx.send(event.clone()).is_ok()));
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn event(sequence: u64, identity: &str, change_type: ChangeType) -> ChangeEvent {
        ChangeEvent {
            sequence,
            collection: "items",
            storage_key: StorageKey::new(),
            identity_key: identity.into(),
            change_type,
        }
    }

    #[test]
    fn emit_and_receive() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();

        let batch = vec![
            event(1, "A", ChangeType::Insert),
            event(1, "B", ChangeType::Delete),
        ];
        feed.emit_batch(batch.clone());

        assert_eq!(rx.recv().unwrap(), batch[0]);
        assert_eq!(rx.recv().unwrap(), batch[1]);
    }

    #[test]
    fn multiple_subscribers() {
        let feed = ChangeFeed::new();
        let rx1 = feed.subscribe();
        let rx2 = feed.subscribe();

        let e = event(1, "A", ChangeType::Update);
        feed.emit_batch(vec![e.clone()]);

        assert_eq!(rx1.recv().unwrap(), e);
        assert_eq!(rx2.recv().unwrap(), e);
    }

    #[test]
    fn subscriber_cleanup() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);

        drop(rx);
        feed.emit_batch(vec![event(1, "A", ChangeType::Insert)]);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn empty_batch_is_ignored() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();
        feed.emit_batch(Vec::new());
        assert_eq!(feed.subscriber_count(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn threaded_subscribe() {
        let feed = Arc::new(ChangeFeed::new());
        let rx = feed.subscribe();

        let feed_clone = Arc::clone(&feed);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            feed_clone.emit_batch(vec![event(7, "A", ChangeType::Insert)]);
        });

        let received = rx.recv_timeout(Duration::from_millis(500)).unwrap();
        assert_eq!(received.sequence, 7);

        handle.join().unwrap();
    }
}
