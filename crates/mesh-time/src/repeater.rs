use crate::{Duration, Instant};

/// Fires once every `interval`, checked by polling rather than a background
/// timer thread.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Repeater {
    interval: Duration,
    last_acted: Instant,
}

impl Repeater {
    #[inline]
    pub fn every(interval: Duration) -> Self {
        Self { interval, last_acted: Instant::ZERO }
    }

    /// Returns `true` (and resets) at most once per `interval`.
    #[inline]
    pub fn fired(&mut self) -> bool {
        if self.last_acted.elapsed() >= self.interval {
            self.last_acted = Instant::now();
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[inline]
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Restarts the interval from now, without firing.
    pub fn reset(&mut self) {
        self.last_acted = Instant::now();
    }

    /// Makes the next `fired()` call return `true` regardless of interval.
    pub fn force_fire(&mut self) {
        self.last_acted = Instant::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_interval() {
        let mut r = Repeater::every(Duration::from_millis(5));
        assert!(r.fired());
        assert!(!r.fired());
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(r.fired());
    }

    #[test]
    fn force_fire_makes_next_check_true() {
        let mut r = Repeater::every(Duration::from_secs(60));
        assert!(r.fired());
        assert!(!r.fired());
        r.force_fire();
        assert!(r.fired());
    }
}
