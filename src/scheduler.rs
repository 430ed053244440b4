//! RA deadline scheduling: jittered periodic emission, solicited-RA
//! handling, and the rate-limit floor.

use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::constants::{MAX_RA_DELAY_TIME, MAX_RTR_ADV_INTERVAL, MIN_DELAY_BETWEEN_RAS, MIN_RTR_ADV_INTERVAL};
use crate::random::{jitter_duration, RandomSource};

pub struct Scheduler<'a> {
    clock: &'a dyn Clock,
    random: &'a dyn RandomSource,
    next_advert: Instant,
    next_advert_earliest: Instant,
}

impl<'a> Scheduler<'a> {
    /// `next_advert` and `next_advert_earliest` both start at the clock's
    /// current instant.
    pub fn new(clock: &'a dyn Clock, random: &'a dyn RandomSource) -> Self {
        let now = clock.now();
        Self {
            clock,
            random,
            next_advert: now,
            next_advert_earliest: now,
        }
    }

    pub fn next_advert(&self) -> Instant {
        self.next_advert
    }

    /// Recomputes `next_advert`. `nodelay` selects solicited
    /// jitter (`[0, MAX_RA_DELAY_TIME)`) vs. the unsolicited interval
    /// (`[MIN_RTR_ADV_INTERVAL, MAX_RTR_ADV_INTERVAL)`).
    pub fn schedule(&mut self, nodelay: bool) {
        let now = self.clock.now();
        let delay = if nodelay {
            jitter_duration(self.random, Duration::ZERO, MAX_RA_DELAY_TIME)
        } else {
            jitter_duration(self.random, MIN_RTR_ADV_INTERVAL, MAX_RTR_ADV_INTERVAL)
        };

        let mut t = now + delay;
        if self.next_advert_earliest > t {
            t = self.next_advert_earliest;
        }

        if nodelay {
            // A solicited RA may advance the deadline but never retard it.
            self.next_advert = self.next_advert.min(t);
        } else {
            self.next_advert = t;
        }
    }

    /// Call immediately after a successful send: raises the rate-limit
    /// floor and reschedules the next unsolicited RA.
    pub fn after_send(&mut self) {
        let now = self.clock.now();
        self.next_advert_earliest = now + MIN_DELAY_BETWEEN_RAS;
        self.schedule(false);
    }

    /// `true` once the clock has reached or passed `next_advert`.
    pub fn is_due(&self) -> bool {
        self.clock.now() >= self.next_advert
    }

    /// Timeout for the event loop's wait primitive: zero if already due,
    /// otherwise the remaining interval until `next_advert`.
    pub fn timeout(&self) -> Duration {
        self.next_advert.saturating_duration_since(self.clock.now())
    }
}
