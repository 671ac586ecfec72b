//! # mirrorsync engine
//!
//! Offline-first downstream sync engine for mirrorsync.
//!
//! This crate provides:
//! - The [`RemoteSource`] and [`ReachabilityMonitor`] capabilities
//! - A reachability-gated, throttled sync scheduler
//! - [`SyncEngine`], which runs fetch-then-reconcile cycles against a
//!   [`mirrorsync_store::LocalStore`] and publishes its run state
//! - A periodic trigger
//! - An HTTP-shaped remote source decoding JSON snapshots
//! - Test doubles ([`MockRemoteSource`], [`ManualReachability`])
//!
//! ## Architecture
//!
//! Each engine keeps one entity type's local collection in line with the
//! remote collection. The remote is authoritative and sync is
//! downstream-only: every run fetches the full remote snapshot and
//! reconciles the local collection against it in one transaction.
//!
//! ```text
//! request_sync() ──┐
//! reachability ────┼──> scheduler task ──> run task: fetch_all() -> reconcile()
//! run finished ────┘          │
//!                             └──> status feed ──> observers
//! ```
//!
//! ## Key Invariants
//!
//! - At most one run is in flight per engine
//! - Two runs never start closer than the throttle window
//! - A request made while a run is in flight is served by a later run
//! - A failed run leaves the local collection unchanged and is reported
//!   through `last_error`; the engine stays usable
//! - Observers see each run's completion as one status update

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod http;
mod reachability;
mod remote;
mod scheduler;
mod status;
mod trigger;

pub use config::{
    ProbeConfig, SyncConfig, DEFAULT_POLL_INTERVAL, DEFAULT_REFRESH_INTERVAL,
    DEFAULT_THROTTLE_WINDOW,
};
pub use engine::{SyncEngine, SyncHandle};
pub use error::{ErrorInfo, ErrorKind, SyncError, SyncResult};
pub use http::{HttpClient, HttpRemoteSource};
pub use reachability::{ManualReachability, ProbeReachability, ReachabilityMonitor};
pub use remote::{MockRemoteSource, RemoteSource};
pub use status::{StatusStream, SyncStats, SyncStatus};
pub use trigger::PeriodicTrigger;
