//! Heartbeat timer (C3), per `spec.md` §4.3.
//!
//! Built on [`mesh_time::Repeater`] for tick cadence. Every inbound frame
//! calls [`Heartbeat::beat`], resetting the miss counter; [`Heartbeat::poll`]
//! is called once per `tick()` and reports whether a tick fired and, if the
//! miss threshold was just crossed, what recovery action the caller bound to
//! this heartbeat (see [`OnTimeout`]).

use mesh_time::{Duration, Repeater};

/// What a timed-out heartbeat should trigger. `gce::socket_actor` binds the
/// outbound (connector) branch's timeout to `reconn()` — a transport reset
/// that falls into the reconnect driver without tearing the actor down —
/// while the inbound (acceptor-attached) branch binds timeout to `close()`
/// since an accepted connection has nothing to reconnect to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnTimeout {
    Reconnect,
    Close,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Idle,
    /// A tick fired and a heartbeat frame should be sent.
    Tick,
    /// `miss_count` consecutive ticks have elapsed with no `beat()`.
    TimedOut(OnTimeout),
}

#[derive(Debug)]
pub struct Heartbeat {
    ticker: Repeater,
    miss_count: u32,
    misses: u32,
    on_timeout: OnTimeout,
    running: bool,
}

impl Heartbeat {
    pub fn new(period: Duration, miss_count: u32, on_timeout: OnTimeout) -> Self {
        Self { ticker: Repeater::every(period), miss_count, misses: 0, on_timeout, running: false }
    }

    /// Starts (or restarts) the ticker without counting any prior misses
    /// against the new run.
    pub fn start(&mut self) {
        self.ticker.reset();
        self.misses = 0;
        self.running = true;
    }

    /// Cancels pending ticks. Idempotent.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Evidence of peer liveness: resets the miss counter.
    pub fn beat(&mut self) {
        self.misses = 0;
    }

    /// Advances the ticker by one `tick()` call's worth of wall-clock time.
    /// Returns [`PollOutcome::Tick`] at most once per `period`, and
    /// [`PollOutcome::TimedOut`] exactly when the miss count first reaches
    /// `miss_count` (never retriggers until the counter is reset by `beat()`
    /// or `start()`).
    pub fn poll(&mut self) -> PollOutcome {
        if !self.running || !self.ticker.fired() {
            return PollOutcome::Idle;
        }
        self.misses += 1;
        if self.misses == self.miss_count {
            PollOutcome::TimedOut(self.on_timeout)
        } else {
            PollOutcome::Tick
        }
    }
}
