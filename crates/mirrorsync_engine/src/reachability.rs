//! Network reachability signals.

use crate::config::{ProbeConfig, DEFAULT_POLL_INTERVAL};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Exposes whether the remote source is currently reachable.
///
/// The value held by a fresh monitor must reflect real connectivity, not an
/// assumed default: engines gate on it as soon as they are constructed.
pub trait ReachabilityMonitor: Send + Sync {
    /// Returns the current reachability.
    fn current(&self) -> bool;

    /// Returns a receiver holding the current value and notified on change.
    ///
    /// If the monitor is dropped, receivers keep the last published value.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// A reachability signal driven by the embedder.
///
/// Useful for platforms that already expose connectivity callbacks, and for
/// tests.
#[derive(Debug)]
pub struct ManualReachability {
    tx: watch::Sender<bool>,
}

impl ManualReachability {
    /// Creates a monitor with the given initial value.
    pub fn new(reachable: bool) -> Self {
        let (tx, _rx) = watch::channel(reachable);
        Self { tx }
    }

    /// Publishes a new reachability value.
    ///
    /// Subscribers are only notified if the value changed.
    pub fn set(&self, reachable: bool) {
        self.tx.send_if_modified(|current| {
            if *current == reachable {
                false
            } else {
                *current = reachable;
                true
            }
        });
    }
}

impl ReachabilityMonitor for ManualReachability {
    fn current(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Reachability derived from periodically opening a TCP connection.
///
/// [`ProbeReachability::start`] probes once before returning, so the initial
/// value is real. A background task then re-probes every
/// `poll_interval` and publishes only changes. Dropping the monitor stops
/// the task.
#[derive(Debug)]
pub struct ProbeReachability {
    rx: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

impl ProbeReachability {
    /// Probes `config.address` and starts the polling task.
    pub async fn start(mut config: ProbeConfig) -> Self {
        if config.poll_interval.is_zero() {
            warn!(
                address = %config.address,
                fallback_ms = DEFAULT_POLL_INTERVAL.as_millis() as u64,
                "zero probe interval, using default"
            );
            config.poll_interval = DEFAULT_POLL_INTERVAL;
        }

        let initial = probe(&config).await;
        info!(address = %config.address, reachable = initial, "reachability probe started");

        let (tx, rx) = watch::channel(initial);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(
                Instant::now() + config.poll_interval,
                config.poll_interval,
            );
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let reachable = probe(&config).await;
                let changed = tx.send_if_modified(|current| {
                    if *current == reachable {
                        false
                    } else {
                        *current = reachable;
                        true
                    }
                });
                if changed {
                    info!(address = %config.address, reachable, "reachability changed");
                }
            }
        });

        Self { rx, task }
    }
}

impl ReachabilityMonitor for ProbeReachability {
    fn current(&self) -> bool {
        *self.rx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}

impl Drop for ProbeReachability {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn probe(config: &ProbeConfig) -> bool {
    match timeout(config.connect_timeout, TcpStream::connect(config.address.as_str())).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            debug!(address = %config.address, error = %e, "probe failed");
            false
        }
        Err(_) => {
            debug!(address = %config.address, "probe timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn manual_notifies_only_on_change() {
        let monitor = ManualReachability::new(false);
        let mut rx = monitor.subscribe();
        assert!(!*rx.borrow_and_update());

        monitor.set(false);
        assert!(!rx.has_changed().unwrap());

        monitor.set(true);
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
        assert!(monitor.current());
    }

    #[tokio::test]
    async fn probe_reports_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let monitor = ProbeReachability::start(
            ProbeConfig::new(address).with_connect_timeout(Duration::from_millis(500)),
        )
        .await;
        assert!(monitor.current());
    }

    #[tokio::test]
    async fn probe_reports_closed_port() {
        let address = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let monitor = ProbeReachability::start(
            ProbeConfig::new(address).with_connect_timeout(Duration::from_millis(500)),
        )
        .await;
        assert!(!monitor.current());
    }

    #[tokio::test]
    async fn probe_publishes_changes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let monitor = ProbeReachability::start(
            ProbeConfig::new(address)
                .with_poll_interval(Duration::from_millis(20))
                .with_connect_timeout(Duration::from_millis(500)),
        )
        .await;
        let mut rx = monitor.subscribe();
        assert!(*rx.borrow_and_update());

        drop(listener);
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(!*rx.borrow());
    }

    #[tokio::test]
    async fn zero_poll_interval_keeps_polling() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let monitor = ProbeReachability::start(
            ProbeConfig::new(address)
                .with_poll_interval(Duration::ZERO)
                .with_connect_timeout(Duration::from_millis(500)),
        )
        .await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(monitor.current());
        assert!(!monitor.task.is_finished());
    }
}
