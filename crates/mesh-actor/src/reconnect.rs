//! Reconnect driver (C4), per `spec.md` §4.4.
//!
//! Parameterized with `{init_reconn_period, init_reconn_try, reconn_period,
//! reconn_try}`. The initial connect uses the `init_*` pair; if it exhausts
//! retries, [`ReconnectDriver::initial_exhausted`] becomes true and the
//! caller reports failure to the originator via one `NEW_CONN` reply, but
//! the driver itself keeps going — it switches to the `reconn_*` pair and
//! retries indefinitely, bounded only by an explicit [`ReconnectDriver::stop`].
//!
//! `curr_reconn_` in the original is seeded with
//! `std::numeric_limits<size_t>::max()` and only assigned `reconn_try` after
//! the first steady-state failure, making the outer loop's attempt budget
//! effectively unbounded until that point. This crate keeps an
//! `Option<u32>` remaining-attempts counter instead of a sentinel integer:
//! `None` means "unbounded, not yet assigned" (see `spec.md` §9, `SPEC_FULL.md`
//! §4.4).

use mesh_time::{Duration, Repeater};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectConfig {
    pub init_reconn_period: Duration,
    pub init_reconn_try: u32,
    pub reconn_period: Duration,
    pub reconn_try: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Initial,
    Steady,
}

/// What the caller should do on this `tick()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconnectAction {
    /// Nothing to do yet (waiting on the backoff timer).
    Wait,
    /// Attempt a connect now.
    Attempt,
    /// The initial phase exhausted its retries: report `NEW_CONN(failure)`
    /// to the originator exactly once, then keep retrying with steady-state
    /// parameters.
    ReportInitialFailure,
}

/// Drives the retry loop described in `spec.md` §4.4. Owns no transport
/// itself — the caller calls [`Self::poll`] each `tick()`, attempts a
/// connect when told to, and reports the outcome back via [`Self::on_failure`]
/// / [`Self::on_success`].
#[derive(Debug)]
pub struct ReconnectDriver {
    cfg: ReconnectConfig,
    phase: Phase,
    /// Remaining attempts in the current phase. `None` while in `Steady`
    /// phase before the first failure is recorded, matching the "effectively
    /// unbounded tail" behavior.
    remaining: Option<u32>,
    backoff: Repeater,
    waiting: bool,
    reported_initial_failure: bool,
}

impl ReconnectDriver {
    pub fn new(cfg: ReconnectConfig) -> Self {
        Self {
            cfg,
            phase: Phase::Initial,
            remaining: Some(cfg.init_reconn_try),
            backoff: Repeater::every(cfg.init_reconn_period),
            waiting: false,
            reported_initial_failure: false,
        }
    }

    /// First attempt should fire immediately, with no backoff wait.
    pub fn poll(&mut self) -> ReconnectAction {
        if self.reported_initial_failure {
            self.reported_initial_failure = false;
            return ReconnectAction::ReportInitialFailure;
        }
        if !self.waiting {
            return ReconnectAction::Attempt;
        }
        if self.backoff.fired() {
            self.waiting = false;
            ReconnectAction::Attempt
        } else {
            ReconnectAction::Wait
        }
    }

    /// Call after a successful `connect()`. Resets phase bookkeeping so a
    /// later disconnect starts the initial phase's budget fresh? No: only
    /// the very first connect (actor construction) uses the initial phase.
    /// A later reconnect success simply clears the wait flag; phase stays
    /// wherever it already was (`spec.md` never returns to `Initial` once
    /// `Steady` begins).
    pub fn on_success(&mut self) {
        self.waiting = false;
    }

    /// Call after a failed connect attempt. Decrements the current phase's
    /// budget and flips to `Steady` with its own try-count once `Initial`
    /// is exhausted, per `spec.md`'s flagged ambiguity: the initial phase
    /// exhausting never stops the driver, it only changes which parameters
    /// govern the wait/retry budget.
    pub fn on_failure(&mut self) {
        match self.phase {
            Phase::Initial => {
                let left = self.remaining.unwrap_or(0).saturating_sub(1);
                if left == 0 {
                    self.phase = Phase::Steady;
                    self.remaining = None;
                    self.reported_initial_failure = true;
                    self.backoff.set_interval(self.cfg.reconn_period);
                } else {
                    self.remaining = Some(left);
                }
            }
            Phase::Steady => {
                self.remaining = Some(self.remaining.unwrap_or(self.cfg.reconn_try).saturating_sub(1));
            }
        }
        self.waiting = true;
        self.backoff.force_fire();
    }

    /// Returns `true` once the steady-state budget hits zero — the actor
    /// should give up with a fatal `NET_ERR` (`spec.md` §4.8's outbound
    /// branch: "decrement `curr_reconn`, either exit with `NET_ERR` (if
    /// exhausted) or reconnect").
    pub fn steady_state_exhausted(&self) -> bool {
        matches!(self.phase, Phase::Steady) && self.remaining == Some(0)
    }

    /// Aborts a pending backoff wait, e.g. because `close()` flipped state to
    /// `OFF` mid-wait (`spec.md` §4.4 "if the state flips to OFF during the
    /// wait, abort").
    pub fn abort_wait(&mut self) {
        self.waiting = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ReconnectConfig {
        ReconnectConfig {
            init_reconn_period: Duration::ZERO,
            init_reconn_try: 2,
            reconn_period: Duration::ZERO,
            reconn_try: 3,
        }
    }

    #[test]
    fn first_poll_attempts_immediately() {
        let mut d = ReconnectDriver::new(cfg());
        assert_eq!(d.poll(), ReconnectAction::Attempt);
    }

    #[test]
    fn initial_exhaustion_reports_once_then_continues_retrying() {
        let mut d = ReconnectDriver::new(cfg());
        assert_eq!(d.poll(), ReconnectAction::Attempt);
        d.on_failure(); // 1 of 2 used
        assert_eq!(d.poll(), ReconnectAction::Attempt); // Duration::ZERO backoff fires immediately
        d.on_failure(); // exhausts init_reconn_try
        assert_eq!(d.poll(), ReconnectAction::ReportInitialFailure);
        // Exactly one report; subsequent polls behave like a normal steady attempt.
        assert_eq!(d.poll(), ReconnectAction::Attempt);
        assert!(!d.steady_state_exhausted());
    }

    #[test]
    fn steady_state_budget_is_independent_of_initial_budget() {
        let mut d = ReconnectDriver::new(cfg());
        d.poll();
        d.on_failure();
        d.poll();
        d.on_failure(); // now in Steady, remaining reset to None -> first use seeds reconn_try
        d.poll(); // consumes ReportInitialFailure
        for _ in 0..3 {
            d.poll();
            d.on_failure();
        }
        assert!(d.steady_state_exhausted());
    }

    #[test]
    fn success_clears_wait_flag() {
        let mut d = ReconnectDriver::new(cfg());
        d.poll();
        d.on_failure();
        d.on_success();
        assert_eq!(d.poll(), ReconnectAction::Attempt);
    }

    #[test]
    fn abort_wait_does_not_panic_and_leaves_driver_usable() {
        let mut d = ReconnectDriver::new(ReconnectConfig {
            init_reconn_period: Duration::from_secs(60),
            init_reconn_try: 1,
            reconn_period: Duration::from_secs(60),
            reconn_try: 1,
        });
        d.poll();
        d.on_failure();
        d.abort_wait();
    }
}
