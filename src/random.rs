//! Injectable jitter source. Production draws from the
//! process-wide CSPRNG via `rand`; tests substitute a deterministic sequence
//! to pin down the distribution properties.

use std::time::Duration;

pub trait RandomSource: Send + Sync {
    /// Uniform draw in the half-open millisecond range `[min, max)`.
    /// `max` must be strictly greater than `min`.
    fn range_ms(&self, min: u64, max: u64) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandomSource;

impl RandomSource for OsRandomSource {
    fn range_ms(&self, min: u64, max: u64) -> u64 {
        use rand::Rng;
        rand::rng().random_range(min..max)
    }
}

pub fn jitter_duration(source: &dyn RandomSource, min: Duration, max: Duration) -> Duration {
    Duration::from_millis(source.range_ms(min.as_millis() as u64, max.as_millis() as u64))
}

/// Test double: a fixed sequence of draws, repeating the last value once
/// exhausted so tests don't have to size the sequence exactly.
#[cfg(test)]
pub struct FixedSequence {
    values: Vec<u64>,
    idx: std::cell::Cell<usize>,
}

#[cfg(test)]
impl FixedSequence {
    pub fn new(values: Vec<u64>) -> Self {
        Self {
            values,
            idx: std::cell::Cell::new(0),
        }
    }
}

#[cfg(test)]
impl RandomSource for FixedSequence {
    fn range_ms(&self, _min: u64, _max: u64) -> u64 {
        let i = self.idx.get();
        let v = self.values[i.min(self.values.len() - 1)];
        self.idx.set(i + 1);
        v
    }
}
