//! Sync trigger state machine.
//!
//! The scheduler combines three inputs into one trigger decision:
//!
//! ```text
//! should_run = reachable && scheduled && !syncing
//! ```
//!
//! Only transitions of `should_run` into `true` trigger. A run may not start
//! sooner than `window` after the previous run started; a transition inside
//! the window is deferred to the end of the window and re-evaluated then.
//!
//! The scheduler is a plain value with no clock or I/O of its own: the engine
//! feeds it every input change in order, on a single task, together with the
//! current instant, and acts on the returned [`Decision`].

use std::time::Duration;
use tokio::time::Instant;

/// What the engine must do after an input change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    /// Nothing to do.
    Idle,
    /// Start a run now. The scheduler already counts it as syncing.
    Start,
    /// Re-evaluate at the given instant by calling [`Scheduler::deadline`].
    WaitUntil(Instant),
}

#[derive(Debug)]
pub(crate) struct Scheduler {
    window: Duration,
    scheduled: bool,
    reachable: bool,
    syncing: bool,
    /// Last evaluated value of the predicate.
    armed: bool,
    last_start: Option<Instant>,
    deferred_until: Option<Instant>,
    /// Number of requests received so far.
    requests: u64,
    /// Value of `requests` when the current or last run started.
    requests_at_start: u64,
}

impl Scheduler {
    pub(crate) fn new(window: Duration, reachable: bool) -> Self {
        Self {
            window,
            scheduled: false,
            reachable,
            syncing: false,
            armed: false,
            last_start: None,
            deferred_until: None,
            requests: 0,
            requests_at_start: 0,
        }
    }

    pub(crate) fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    pub(crate) fn is_reachable(&self) -> bool {
        self.reachable
    }

    pub(crate) fn is_syncing(&self) -> bool {
        self.syncing
    }

    fn should_run(&self) -> bool {
        self.reachable && self.scheduled && !self.syncing
    }

    /// A caller asked for a sync.
    pub(crate) fn request(&mut self, now: Instant) -> Decision {
        self.requests += 1;
        self.scheduled = true;
        self.evaluate(now)
    }

    /// Reachability changed.
    pub(crate) fn set_reachable(&mut self, reachable: bool, now: Instant) -> Decision {
        self.reachable = reachable;
        self.evaluate(now)
    }

    /// The in-flight run finished, successfully or not.
    ///
    /// The run consumed every request received before it started; requests
    /// that arrived while it was in flight keep the sync scheduled.
    pub(crate) fn finish(&mut self, now: Instant) -> Decision {
        self.scheduled = self.requests > self.requests_at_start;
        self.syncing = false;
        self.evaluate(now)
    }

    /// A deferral deadline returned earlier has passed.
    pub(crate) fn deadline(&mut self, now: Instant) -> Decision {
        match self.deferred_until {
            Some(until) if now >= until => {
                self.deferred_until = None;
                if self.should_run() {
                    self.start(now)
                } else {
                    self.armed = false;
                    Decision::Idle
                }
            }
            Some(until) => Decision::WaitUntil(until),
            None => Decision::Idle,
        }
    }

    fn evaluate(&mut self, now: Instant) -> Decision {
        let should_run = self.should_run();
        let rising = should_run && !self.armed;
        self.armed = should_run;

        if !rising {
            return Decision::Idle;
        }

        match self.last_start {
            Some(started) if now < started + self.window => {
                let until = started + self.window;
                self.deferred_until = Some(until);
                Decision::WaitUntil(until)
            }
            _ => self.start(now),
        }
    }

    fn start(&mut self, now: Instant) -> Decision {
        self.syncing = true;
        self.armed = false;
        self.last_start = Some(now);
        self.deferred_until = None;
        self.requests_at_start = self.requests;
        Decision::Start
    }
}
