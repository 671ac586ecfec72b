//! Periodic sync requests.

use crate::engine::SyncHandle;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Requests a sync on a fixed period.
///
/// The first request is made one period after starting. Stopping (or
/// dropping) the trigger cancels future ticks only; a run already in flight
/// is not affected.
#[derive(Debug)]
pub struct PeriodicTrigger {
    period: Duration,
    task: JoinHandle<()>,
}

impl PeriodicTrigger {
    /// Starts requesting syncs on `handle` every `period`.
    ///
    /// Returns `None` for a zero period.
    pub fn start(handle: SyncHandle, period: Duration) -> Option<Self> {
        if period.is_zero() {
            warn!("refusing to start a periodic trigger with a zero period");
            return None;
        }

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                debug!("periodic sync request");
                handle.request_sync();
            }
        });

        Some(Self { period, task })
    }

    /// Returns the trigger period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Cancels future ticks.
    pub fn stop(&self) {
        self.task.abort();
    }

    /// Returns true if the trigger is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PeriodicTrigger {
    fn drop(&mut self) {
        self.task.abort();
    }
}
