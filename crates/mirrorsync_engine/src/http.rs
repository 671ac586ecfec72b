//! HTTP-shaped remote source.
//!
//! The actual HTTP client is abstracted via a trait so that any client
//! library, or a non-network stand-in, can serve snapshots. Snapshots are
//! JSON arrays of DTOs.

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteSource;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual transport.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a GET request and returns the response body.
    ///
    /// Transport failures and non-success responses are reported as `Err`
    /// with a description.
    async fn get(&self, url: &str) -> Result<Vec<u8>, String>;
}

/// A [`RemoteSource`] fetching a JSON array of `D` from `{base_url}/{path}`.
pub struct HttpRemoteSource<C, D> {
    base_url: String,
    path: String,
    client: C,
    _dto: PhantomData<fn() -> D>,
}

impl<C: HttpClient, D> HttpRemoteSource<C, D> {
    /// Creates a source for the collection at `path` below `base_url`.
    pub fn new(base_url: impl Into<String>, path: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            client,
            _dto: PhantomData,
        }
    }

    /// Returns the full collection URL.
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C, D> fmt::Debug for HttpRemoteSource<C, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRemoteSource")
            .field("base_url", &self.base_url)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C, D> RemoteSource for HttpRemoteSource<C, D>
where
    C: HttpClient,
    D: DeserializeOwned + Send + 'static,
{
    type Dto = D;

    async fn fetch_all(&self) -> SyncResult<Vec<D>> {
        let url = self.url();
        let body = self
            .client
            .get(&url)
            .await
            .map_err(|e| SyncError::network(format!("GET {url}: {e}")))?;

        serde_json::from_slice(&body).map_err(|e| SyncError::Decoding(format!("{url}: {e}")))
    }
}
