use std::{
    ops::{Add, Sub},
    sync::OnceLock,
    time::Instant as StdInstant,
};

use crate::Duration;

static EPOCH: OnceLock<StdInstant> = OnceLock::new();

#[inline]
fn epoch() -> StdInstant {
    *EPOCH.get_or_init(StdInstant::now)
}

/// Monotonic timestamp, nanoseconds since this process's epoch.
///
/// `ZERO` predates every real reading, so a `Repeater`/heartbeat counter
/// seeded with it always fires on its first check.
#[derive(Copy, Clone, Debug, Default, Hash, PartialEq, Eq)]
#[repr(C)]
pub struct Instant(pub u64);

impl Instant {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(u64::MAX);

    #[inline]
    pub fn now() -> Self {
        Self(epoch().elapsed().as_nanos() as u64)
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        Self::now().saturating_sub(*self)
    }

    #[inline]
    pub fn saturating_sub(&self, other: Instant) -> Duration {
        Duration(self.0.saturating_sub(other.0))
    }
}

impl PartialOrd for Instant {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Instant {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sub for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        Duration(self.0.saturating_sub(rhs.0))
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant(self.0.saturating_add(rhs.0))
    }
}
