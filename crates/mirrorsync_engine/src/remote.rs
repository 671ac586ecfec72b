//! Remote source abstraction.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

/// A remote source fetches the complete current collection for one entity
/// type.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, a local directory, mock for testing, etc.).
///
/// Every call is an independent full snapshot fetch. The engine calls it at
/// most once per run and never retries inside a run.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// DTO type carried by a snapshot.
    type Dto: Send + 'static;

    /// Fetches the full remote collection.
    async fn fetch_all(&self) -> SyncResult<Vec<Self::Dto>>;
}

/// A scripted remote source for testing.
///
/// Returns the configured snapshot on every call, unless a failure was
/// queued with [`MockRemoteSource::fail_next`]. A gated mock holds every
/// fetch until [`MockRemoteSource::release`] hands out a permit, which keeps
/// a run in flight for as long as a test needs.
#[derive(Debug)]
pub struct MockRemoteSource<D> {
    snapshot: Mutex<Vec<D>>,
    failures: Mutex<VecDeque<SyncError>>,
    calls: AtomicUsize,
    gate: Option<Semaphore>,
}

impl<D: Clone> MockRemoteSource<D> {
    /// Creates a mock returning `snapshot`.
    pub fn new(snapshot: Vec<D>) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Creates a mock whose fetches wait for [`MockRemoteSource::release`].
    pub fn gated(snapshot: Vec<D>) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new(snapshot)
        }
    }

    /// Replaces the snapshot returned by future fetches.
    pub fn set_snapshot(&self, snapshot: Vec<D>) {
        *self.snapshot.lock() = snapshot;
    }

    /// Makes the next fetch fail with `error`.
    pub fn fail_next(&self, error: SyncError) {
        self.failures.lock().push_back(error);
    }

    /// Lets `fetches` held fetches proceed.
    pub fn release(&self, fetches: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(fetches);
        }
    }

    /// Returns how many fetches have started.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<D: Clone + Send + Sync + 'static> RemoteSource for MockRemoteSource<D> {
    type Dto = D;

    async fn fetch_all(&self) -> SyncResult<Vec<D>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| SyncError::network("mock gate closed"))?
                .forget();
        }

        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }
        Ok(self.snapshot.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn returns_snapshot() {
        let remote = MockRemoteSource::new(vec![1, 2, 3]);
        assert_eq!(remote.fetch_all().await.unwrap(), vec![1, 2, 3]);

        remote.set_snapshot(vec![4]);
        assert_eq!(remote.fetch_all().await.unwrap(), vec![4]);
        assert_eq!(remote.call_count(), 2);
    }

    #[tokio::test]
    async fn queued_failure_applies_once() {
        let remote = MockRemoteSource::new(vec![1]);
        remote.fail_next(SyncError::network("offline"));

        let err = remote.fetch_all().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(remote.fetch_all().await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn gated_fetch_waits_for_release() {
        let remote = Arc::new(MockRemoteSource::gated(vec!["a"]));
        let fetch = {
            let remote = Arc::clone(&remote);
            tokio::spawn(async move { remote.fetch_all().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(remote.call_count(), 1);
        assert!(!fetch.is_finished());

        remote.release(1);
        assert_eq!(fetch.await.unwrap().unwrap(), vec!["a"]);
    }
}
