//! CLI command implementations.

pub mod inspect;
pub mod sync;
pub mod watch;

use crate::catalog::CatalogEntity;
use crate::client::StaticDirClient;
use mirrorsync_engine::{
    HttpRemoteSource, ManualReachability, ProbeConfig, ProbeReachability, ReachabilityMonitor,
};
use std::path::PathBuf;

/// Where and how to reach the catalog.
#[derive(Debug, Clone)]
pub struct RemoteOptions {
    /// Base URL of the catalog API.
    pub base_url: String,
    /// Directory the API responses are served from.
    pub remote_dir: PathBuf,
    /// `host:port` probed for reachability. Always reachable when unset.
    pub probe: Option<String>,
}

impl RemoteOptions {
    pub(crate) fn source<E: CatalogEntity>(&self) -> HttpRemoteSource<StaticDirClient, E::Dto> {
        HttpRemoteSource::new(
            self.base_url.clone(),
            E::PATH,
            StaticDirClient::new(self.base_url.clone(), self.remote_dir.clone()),
        )
    }

    pub(crate) async fn reachability(&self) -> Box<dyn ReachabilityMonitor> {
        match &self.probe {
            Some(address) => {
                Box::new(ProbeReachability::start(ProbeConfig::new(address.clone())).await)
            }
            None => Box::new(ManualReachability::new(true)),
        }
    }
}
