//! Configuration for the sync engine.

use std::time::Duration;

/// Default minimum spacing between the starts of two runs.
pub const DEFAULT_THROTTLE_WINDOW: Duration = Duration::from_secs(3);

/// Default period of the refresh timer.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Default time between reachability probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration for a sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Minimum time between the starts of two runs.
    ///
    /// Sync requests that become eligible inside the window are coalesced
    /// into one run at the end of the window.
    pub throttle_window: Duration,
    /// Period of the refresh timer started by `SyncEngine::start`.
    pub refresh_interval: Duration,
}

impl SyncConfig {
    /// Creates a configuration with default timings.
    pub fn new() -> Self {
        Self {
            throttle_window: DEFAULT_THROTTLE_WINDOW,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    /// Sets the throttle window.
    pub fn with_throttle_window(mut self, window: Duration) -> Self {
        self.throttle_window = window;
        self
    }

    /// Sets the refresh timer period.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for [`crate::ProbeReachability`].
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// `host:port` to open a TCP connection to.
    pub address: String,
    /// Time between probes.
    pub poll_interval: Duration,
    /// Time after which a connection attempt counts as unreachable.
    pub connect_timeout: Duration,
}

impl ProbeConfig {
    /// Creates a probe configuration for `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            connect_timeout: Duration::from_secs(2),
        }
    }

    /// Sets the poll interval. A zero interval falls back to
    /// [`DEFAULT_POLL_INTERVAL`] when the probe starts.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
