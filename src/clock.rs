//! Monotonic time source. A trait so the Scheduler's jitter/rate-limit
//! invariants can be checked against a fake, steppable clock
//! instead of real wall-clock time.

use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    /// Current monotonic instant. Must never go backwards.
    fn now(&self) -> Instant;
}

/// `Instant::now()` is already monotonic (steady) on every platform std
/// supports; a wall clock would violate the rate-limit invariant under NTP
/// steps, so this is the only implementation that should back production use.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Test double: starts at an arbitrary instant and only advances when told to.
#[cfg(test)]
pub struct FakeClock {
    now: std::cell::Cell<Instant>,
}

#[cfg(test)]
impl FakeClock {
    pub fn new() -> Self {
        Self {
            now: std::cell::Cell::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

#[cfg(test)]
impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}
