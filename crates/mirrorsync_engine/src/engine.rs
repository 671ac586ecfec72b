//! The sync engine.
//!
//! A [`SyncEngine`] owns one scheduler task. That task is the only place
//! where trigger decisions are made: sync requests, reachability changes,
//! run completions and deferral deadlines are all fed to it in order. Runs
//! execute on their own tasks so the scheduler stays responsive while a
//! fetch or reconciliation is in flight.

use crate::config::SyncConfig;
use crate::error::{ErrorInfo, ErrorKind, SyncError, SyncResult};
use crate::reachability::ReachabilityMonitor;
use crate::remote::RemoteSource;
use crate::scheduler::{Decision, Scheduler};
use crate::status::{StatusFeed, StatusStream, SyncStats, SyncStatus};
use crate::trigger::PeriodicTrigger;
use mirrorsync_store::{LocalStore, ReconcileReport, Syncable, SyncableDto};
use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

type Waiter = oneshot::Sender<Result<(), ErrorInfo>>;

enum Command {
    RequestSync(Option<Waiter>),
}

struct RunFinished {
    run: u64,
    result: SyncResult<ReconcileReport>,
}

#[derive(Debug)]
struct Shared {
    status: StatusFeed,
    stats: Mutex<SyncStats>,
}

/// A cloneable handle to a running [`SyncEngine`].
///
/// Handles are cheap to clone and may be moved to other tasks. Once the
/// engine is dropped, requests made through a handle are ignored.
#[derive(Clone)]
pub struct SyncHandle {
    commands: UnboundedSender<Command>,
    shared: Arc<Shared>,
}

impl SyncHandle {
    /// Asks for a sync.
    ///
    /// Never blocks and never fails. Repeated calls before a run starts have
    /// no additional effect; a call made while a run is in flight schedules
    /// one more run after it.
    pub fn request_sync(&self) {
        self.send(Command::RequestSync(None));
    }

    /// Requests a sync and waits for the run that serves it.
    ///
    /// Resolves with that run's error, if any. Waits for as long as the
    /// remote stays unreachable. If the engine shuts down first, resolves
    /// with an [`ErrorKind::Internal`] error.
    pub async fn sync_and_wait(&self) -> Result<(), ErrorInfo> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::RequestSync(Some(tx)));
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ErrorInfo {
                kind: ErrorKind::Internal,
                message: "sync engine stopped".to_owned(),
                run: self.status().runs_completed,
                retryable: false,
            }),
        }
    }

    /// Returns the current run state.
    pub fn status(&self) -> SyncStatus {
        self.shared.status.current()
    }

    /// Returns cumulative run statistics.
    pub fn stats(&self) -> SyncStats {
        self.shared.stats.lock().clone()
    }

    /// Subscribes to run state snapshots.
    ///
    /// Each snapshot is published once all fields changed by one event have
    /// settled, so observers never see a half-finished run.
    pub fn subscribe(&self) -> StatusStream<SyncStatus> {
        StatusStream::new(self.shared.status.subscribe(), SyncStatus::clone)
    }

    /// Subscribes to `is_syncing` transitions.
    pub fn observe_is_syncing(&self) -> StatusStream<bool> {
        StatusStream::new(self.shared.status.subscribe(), |s| s.is_syncing)
    }

    /// Subscribes to changes of the last run error.
    pub fn observe_last_error(&self) -> StatusStream<Option<ErrorInfo>> {
        StatusStream::new(self.shared.status.subscribe(), |s| s.last_error.clone())
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("sync engine stopped, request ignored");
        }
    }
}

impl fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncHandle")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Keeps a [`LocalStore`] consistent with a [`RemoteSource`].
///
/// The engine runs fetch-then-reconcile cycles when a sync has been
/// requested and the remote is reachable, never more than one at a time and
/// never two starts closer than the configured throttle window.
///
/// Must be created inside a tokio runtime. Dropping the engine stops its
/// scheduler and periodic trigger; a run already in flight still completes.
///
/// # Example
///
/// ```rust,ignore
/// let engine = SyncEngine::new(SyncConfig::default(), remote, store, &reachability);
/// engine.start();
/// engine.request_sync();
///
/// let mut syncing = engine.observe_is_syncing();
/// while let Some(is_syncing) = syncing.next().await {
///     println!("syncing: {is_syncing}");
/// }
/// ```
pub struct SyncEngine<E, R, S> {
    config: SyncConfig,
    handle: SyncHandle,
    remote: Arc<R>,
    store: Arc<S>,
    task: JoinHandle<()>,
    trigger: Mutex<Option<PeriodicTrigger>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E, R, S> SyncEngine<E, R, S>
where
    E: Syncable,
    R: RemoteSource + 'static,
    R::Dto: SyncableDto<E>,
    S: LocalStore<E> + 'static,
{
    /// Creates an engine and starts its scheduler.
    ///
    /// The engine starts idle and unscheduled. Its reachability starts at the
    /// monitor's current value.
    pub fn new(
        config: SyncConfig,
        remote: R,
        store: Arc<S>,
        reachability: &dyn ReachabilityMonitor,
    ) -> Self {
        let mut reachability = reachability.subscribe();
        let reachable = *reachability.borrow_and_update();

        let shared = Arc::new(Shared {
            status: StatusFeed::new(SyncStatus {
                is_reachable: reachable,
                ..SyncStatus::default()
            }),
            stats: Mutex::new(SyncStats::default()),
        });

        let (commands_tx, commands_rx) = unbounded_channel();
        let (finished_tx, finished_rx) = unbounded_channel();
        let remote = Arc::new(remote);

        let worker = Worker {
            scheduler: Scheduler::new(config.throttle_window, reachable),
            remote: Arc::clone(&remote),
            store: Arc::clone(&store),
            shared: Arc::clone(&shared),
            commands: commands_rx,
            reachability,
            finished_tx,
            finished_rx,
            deadline: None,
            runs: 0,
            pending: Vec::new(),
            in_flight: Vec::new(),
            _entity: PhantomData,
        };

        info!(
            collection = E::COLLECTION,
            reachable,
            throttle_window_ms = config.throttle_window.as_millis() as u64,
            "sync engine created"
        );

        Self {
            config,
            handle: SyncHandle {
                commands: commands_tx,
                shared,
            },
            remote,
            store,
            task: tokio::spawn(worker.run()),
            trigger: Mutex::new(None),
            _entity: PhantomData,
        }
    }
}

impl<E, R, S> SyncEngine<E, R, S> {
    /// Asks for a sync. See [`SyncHandle::request_sync`].
    pub fn request_sync(&self) {
        self.handle.request_sync();
    }

    /// Requests a sync and waits for the run that serves it.
    pub async fn sync_and_wait(&self) -> Result<(), ErrorInfo> {
        self.handle.sync_and_wait().await
    }

    /// Returns the current run state.
    pub fn status(&self) -> SyncStatus {
        self.handle.status()
    }

    /// Returns cumulative run statistics.
    pub fn stats(&self) -> SyncStats {
        self.handle.stats()
    }

    /// Subscribes to run state snapshots.
    pub fn subscribe(&self) -> StatusStream<SyncStatus> {
        self.handle.subscribe()
    }

    /// Subscribes to `is_syncing` transitions.
    pub fn observe_is_syncing(&self) -> StatusStream<bool> {
        self.handle.observe_is_syncing()
    }

    /// Subscribes to changes of the last run error.
    pub fn observe_last_error(&self) -> StatusStream<Option<ErrorInfo>> {
        self.handle.observe_last_error()
    }

    /// Returns a cloneable handle to this engine.
    pub fn handle(&self) -> SyncHandle {
        self.handle.clone()
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the remote source.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Returns the local store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Starts the periodic trigger with the configured refresh interval.
    pub fn start(&self) {
        self.start_with_interval(self.config.refresh_interval);
    }

    /// Starts the periodic trigger with the given period.
    ///
    /// Replaces a trigger that is already running.
    pub fn start_with_interval(&self, period: Duration) {
        let trigger = PeriodicTrigger::start(self.handle.clone(), period);
        if trigger.is_some() {
            info!(period_ms = period.as_millis() as u64, "periodic sync started");
        }
        if let Some(previous) = mem::replace(&mut *self.trigger.lock(), trigger) {
            previous.stop();
        }
    }

    /// Stops the periodic trigger. A run in flight is not affected.
    pub fn stop(&self) {
        if let Some(trigger) = self.trigger.lock().take() {
            trigger.stop();
            info!("periodic sync stopped");
        }
    }

    /// Stops the engine and waits until its scheduler has released the
    /// remote source and the store.
    ///
    /// A run still in flight keeps its own references until it completes.
    pub async fn shutdown(mut self) {
        self.stop();
        self.task.abort();
        let _ = (&mut self.task).await;
        debug!("sync engine shut down");
    }

    /// Returns true if the periodic trigger is running.
    pub fn is_started(&self) -> bool {
        self.trigger
            .lock()
            .as_ref()
            .is_some_and(PeriodicTrigger::is_running)
    }
}

impl<E, R, S> fmt::Debug for SyncEngine<E, R, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("status", &self.status())
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

impl<E, R, S> Drop for SyncEngine<E, R, S> {
    fn drop(&mut self) {
        self.stop();
        self.task.abort();
    }
}

/// State owned by the scheduler task.
struct Worker<E, R, S> {
    scheduler: Scheduler,
    remote: Arc<R>,
    store: Arc<S>,
    shared: Arc<Shared>,
    commands: UnboundedReceiver<Command>,
    reachability: watch::Receiver<bool>,
    finished_tx: UnboundedSender<RunFinished>,
    finished_rx: UnboundedReceiver<RunFinished>,
    deadline: Option<Instant>,
    runs: u64,
    /// Waiters for the next run to start.
    pending: Vec<Waiter>,
    /// Waiters for the run in flight.
    in_flight: Vec<Waiter>,
    _entity: PhantomData<fn() -> E>,
}

impl<E, R, S> Worker<E, R, S>
where
    E: Syncable,
    R: RemoteSource + 'static,
    R::Dto: SyncableDto<E>,
    S: LocalStore<E> + 'static,
{
    async fn run(mut self) {
        let mut reachability_open = true;

        loop {
            let wake_at = self.deadline.unwrap_or_else(Instant::now);
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::RequestSync(waiter)) => {
                        self.pending.extend(waiter);
                        // Requests already queued count as one.
                        while let Ok(Command::RequestSync(waiter)) = self.commands.try_recv() {
                            self.pending.extend(waiter);
                        }
                        let decision = self.scheduler.request(Instant::now());
                        self.apply(decision);
                    }
                    None => break,
                },
                Some(finished) = self.finished_rx.recv() => self.finish(finished),
                changed = self.reachability.changed(), if reachability_open => match changed {
                    Ok(()) => {
                        let reachable = *self.reachability.borrow_and_update();
                        debug!(collection = E::COLLECTION, reachable, "reachability changed");
                        let decision = self.scheduler.set_reachable(reachable, Instant::now());
                        self.apply(decision);
                    }
                    Err(_) => {
                        debug!(collection = E::COLLECTION, "reachability monitor dropped");
                        reachability_open = false;
                    }
                },
                () = sleep_until(wake_at), if self.deadline.is_some() => {
                    self.deadline = None;
                    let decision = self.scheduler.deadline(Instant::now());
                    self.apply(decision);
                }
            }
        }

        debug!(collection = E::COLLECTION, "sync scheduler stopped");
    }

    fn apply(&mut self, decision: Decision) {
        match decision {
            Decision::Idle => {}
            Decision::WaitUntil(until) => {
                debug!(
                    collection = E::COLLECTION,
                    delay_ms = until.saturating_duration_since(Instant::now()).as_millis() as u64,
                    "sync deferred to end of throttle window"
                );
                self.deadline = Some(until);
            }
            Decision::Start => {
                self.deadline = None;
                self.start_run();
            }
        }
        self.publish_inputs();
    }

    fn publish_inputs(&self) {
        let scheduled = self.scheduler.is_scheduled();
        let reachable = self.scheduler.is_reachable();
        let syncing = self.scheduler.is_syncing();
        self.shared.status.update(|s| {
            s.is_scheduled = scheduled;
            s.is_reachable = reachable;
            s.is_syncing = syncing;
        });
    }

    fn start_run(&mut self) {
        self.runs += 1;
        let run = self.runs;
        self.in_flight = mem::take(&mut self.pending);
        self.shared.stats.lock().runs_started += 1;
        info!(collection = E::COLLECTION, run, "sync run started");

        let worker = tokio::spawn(run_once::<E, R, S>(
            Arc::clone(&self.remote),
            Arc::clone(&self.store),
        ));

        // The completion is reported on every exit path, including a
        // panicking worker.
        let finished_tx = self.finished_tx.clone();
        tokio::spawn(async move {
            let result = match worker.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(SyncError::Internal("sync run panicked".into())),
                Err(e) => Err(SyncError::Internal(format!("sync run aborted: {e}"))),
            };
            let _ = finished_tx.send(RunFinished { run, result });
        });
    }

    fn finish(&mut self, finished: RunFinished) {
        let RunFinished { run, result } = finished;

        let last_error = {
            let mut stats = self.shared.stats.lock();
            match &result {
                Ok(report) => {
                    info!(
                        collection = E::COLLECTION,
                        run,
                        inserted = report.inserted,
                        updated = report.updated,
                        deleted = report.deleted,
                        "sync run finished"
                    );
                    stats.runs_succeeded += 1;
                    stats.records_inserted += report.inserted as u64;
                    stats.records_updated += report.updated as u64;
                    stats.records_deleted += report.deleted as u64;
                    stats.last_success = Some(Instant::now());
                    None
                }
                Err(e) => {
                    warn!(collection = E::COLLECTION, run, error = %e, "sync run failed");
                    stats.runs_failed += 1;
                    Some(ErrorInfo::from_error(e, run))
                }
            }
        };

        let decision = self.scheduler.finish(Instant::now());
        let scheduled = self.scheduler.is_scheduled();
        self.shared.status.update(|s| {
            s.last_error = last_error.clone();
            s.is_scheduled = scheduled;
            s.is_syncing = false;
            s.runs_completed += 1;
        });

        // Waiters wake only after the cleanup is visible.
        for waiter in self.in_flight.drain(..) {
            let _ = waiter.send(match &last_error {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            });
        }

        self.apply(decision);
    }
}

/// One fetch-then-reconcile cycle.
async fn run_once<E, R, S>(remote: Arc<R>, store: Arc<S>) -> SyncResult<ReconcileReport>
where
    E: Syncable,
    R: RemoteSource,
    R::Dto: SyncableDto<E>,
    S: LocalStore<E> + 'static,
{
    let snapshot = remote.fetch_all().await?;
    debug!(collection = E::COLLECTION, dtos = snapshot.len(), "snapshot fetched");

    let report = tokio::task::spawn_blocking(move || LocalStore::<E>::reconcile(&*store, &snapshot))
        .await
        .map_err(|e| SyncError::Internal(format!("reconcile task failed: {e}")))??;
    Ok(report)
}
