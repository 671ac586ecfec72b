//! Observable run state.

use crate::error::ErrorInfo;
use parking_lot::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;

/// Snapshot of an engine's run state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// A run is in flight.
    pub is_syncing: bool,
    /// A sync was requested and not yet consumed by a run.
    pub is_scheduled: bool,
    /// The remote source is reachable.
    pub is_reachable: bool,
    /// Error of the most recently finished run, `None` if it succeeded.
    pub last_error: Option<ErrorInfo>,
    /// Number of runs that have finished, successfully or not.
    pub runs_completed: u64,
}

/// Cumulative run statistics.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Total number of runs started.
    pub runs_started: u64,
    /// Total number of runs that committed a reconciliation.
    pub runs_succeeded: u64,
    /// Total number of runs that ended with an error.
    pub runs_failed: u64,
    /// Total number of records inserted.
    pub records_inserted: u64,
    /// Total number of records updated in place.
    pub records_updated: u64,
    /// Total number of records deleted.
    pub records_deleted: u64,
    /// Time the last successful run finished.
    pub last_success: Option<Instant>,
}

/// Publishes [`SyncStatus`] snapshots to subscribers.
///
/// The current snapshot and the subscriber list share one lock, so a new
/// subscriber receives the current snapshot followed by every later one,
/// with nothing missed or reordered. Unchanged snapshots are not published.
#[derive(Debug)]
pub(crate) struct StatusFeed {
    inner: Mutex<FeedInner>,
}

#[derive(Debug)]
struct FeedInner {
    current: SyncStatus,
    subscribers: Vec<UnboundedSender<SyncStatus>>,
}

impl StatusFeed {
    pub(crate) fn new(initial: SyncStatus) -> Self {
        Self {
            inner: Mutex::new(FeedInner {
                current: initial,
                subscribers: Vec::new(),
            }),
        }
    }

    pub(crate) fn current(&self) -> SyncStatus {
        self.inner.lock().current.clone()
    }

    pub(crate) fn subscribe(&self) -> UnboundedReceiver<SyncStatus> {
        let (tx, rx) = unbounded_channel();
        let mut inner = self.inner.lock();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(inner.current.clone());
        inner.subscribers.push(tx);
        rx
    }

    /// Applies `f` to the current snapshot and publishes the result as one
    /// update.
    pub(crate) fn update(&self, f: impl FnOnce(&mut SyncStatus)) {
        let mut inner = self.inner.lock();
        let mut next = inner.current.clone();
        f(&mut next);
        if next == inner.current {
            return;
        }

        inner.subscribers.retain(|tx| tx.send(next.clone()).is_ok());
        inner.current = next;
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

/// A stream of values projected from [`SyncStatus`] snapshots.
///
/// Consecutive equal values are collapsed, so a `StatusStream<bool>` over
/// `is_syncing` yields exactly the transitions. The first value is the
/// engine's state at subscription time.
#[derive(Debug)]
pub struct StatusStream<T> {
    rx: UnboundedReceiver<SyncStatus>,
    project: fn(&SyncStatus) -> T,
    last: Option<T>,
}

impl<T: Clone + PartialEq> StatusStream<T> {
    pub(crate) fn new(rx: UnboundedReceiver<SyncStatus>, project: fn(&SyncStatus) -> T) -> Self {
        Self {
            rx,
            project,
            last: None,
        }
    }

    /// Waits for the next distinct value.
    ///
    /// Returns `None` once the engine has shut down and every published
    /// value has been consumed.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            let status = self.rx.recv().await?;
            let value = (self.project)(&status);
            if self.last.as_ref() != Some(&value) {
                self.last = Some(value.clone());
                return Some(value);
            }
        }
    }

    /// Returns the next distinct value if one is already available.
    pub fn try_next(&mut self) -> Option<T> {
        while let Ok(status) = self.rx.try_recv() {
            let value = (self.project)(&status);
            if self.last.as_ref() != Some(&value) {
                self.last = Some(value.clone());
                return Some(value);
            }
        }
        None
    }

    /// Waits until a value satisfies `pred` and returns it.
    pub async fn wait_for(&mut self, mut pred: impl FnMut(&T) -> bool) -> Option<T> {
        loop {
            let value = self.next().await?;
            if pred(&value) {
                return Some(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, SyncError};

    #[test]
    fn subscriber_gets_current_then_updates() {
        let feed = StatusFeed::new(SyncStatus::default());
        feed.update(|s| s.is_reachable = true);

        let mut rx = feed.subscribe();
        assert!(rx.try_recv().unwrap().is_reachable);

        feed.update(|s| s.is_scheduled = true);
        let status = rx.try_recv().unwrap();
        assert!(status.is_reachable && status.is_scheduled);
    }

    #[test]
    fn unchanged_update_not_published() {
        let feed = StatusFeed::new(SyncStatus::default());
        let mut rx = feed.subscribe();
        rx.try_recv().unwrap();

        feed.update(|s| s.is_syncing = false);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let feed = StatusFeed::new(SyncStatus::default());
        let rx = feed.subscribe();
        let _keep = feed.subscribe();
        drop(rx);

        feed.update(|s| s.is_syncing = true);
        assert_eq!(feed.subscriber_count(), 1);
    }

    #[test]
    fn projection_collapses_repeats() {
        let feed = StatusFeed::new(SyncStatus::default());
        let mut stream = StatusStream::new(feed.subscribe(), |s| s.is_syncing);

        feed.update(|s| s.is_scheduled = true);
        feed.update(|s| s.is_syncing = true);
        feed.update(|s| s.is_scheduled = false);
        feed.update(|s| s.is_syncing = false);

        assert_eq!(stream.try_next(), Some(false));
        assert_eq!(stream.try_next(), Some(true));
        assert_eq!(stream.try_next(), Some(false));
        assert_eq!(stream.try_next(), None);
    }

    #[test]
    fn repeated_failures_are_distinct() {
        let feed = StatusFeed::new(SyncStatus::default());
        let mut stream = StatusStream::new(feed.subscribe(), |s| s.last_error.clone());
        assert_eq!(stream.try_next(), Some(None));

        for run in 1..=2 {
            feed.update(|s| {
                s.last_error = Some(ErrorInfo::from_error(&SyncError::network("offline"), run));
            });
        }

        let first = stream.try_next().unwrap().unwrap();
        let second = stream.try_next().unwrap().unwrap();
        assert_eq!(first.kind, ErrorKind::Network);
        assert_eq!((first.run, second.run), (1, 2));
    }
}
