//! Time-ordered sample buffer for dynamic transforms on one frame edge.
//!
//! Samples are kept strictly ordered by timestamp inside a sliding cache
//! window; anything older than `newest - cache_time` is evicted on insert.
//! Queries interpolate (slerp + linear translation) between the two samples
//! bracketing the requested time.

use crate::error::{RctError, RctResult};
use crate::transform::Transform;
use std::collections::VecDeque;

/// Timestamp value meaning "give me the latest sample"
pub const TIME_LATEST: u64 = 0;

/// Ordered series of dynamic transform samples within a cache-time window
#[derive(Debug, Clone)]
pub struct TimeBuffer {
    samples: VecDeque<Transform>,
    cache_time_ms: u64,
}

impl TimeBuffer {
    /// Create an empty buffer with the given eviction window in milliseconds
    pub fn new(cache_time_ms: u64) -> Self {
        Self {
            samples: VecDeque::new(),
            cache_time_ms,
        }
    }

    /// Number of buffered samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Oldest buffered timestamp
    pub fn oldest_time(&self) -> Option<u64> {
        self.samples.front().map(|t| t.time)
    }

    /// Newest buffered timestamp
    pub fn newest_time(&self) -> Option<u64> {
        self.samples.back().map(|t| t.time)
    }

    /// Insert a sample, keeping the series ordered by time
    ///
    /// A sample with a timestamp already present replaces the stored one.
    /// After insertion, samples older than `newest - cache_time` are evicted.
    pub fn insert(&mut self, transform: Transform) {
        match self
            .samples
            .binary_search_by_key(&transform.time, |t| t.time)
        {
            Ok(pos) => self.samples[pos] = transform,
            Err(pos) => self.samples.insert(pos, transform),
        }
        self.evict();
    }

    /// Drop samples that have aged out of the cache window
    fn evict(&mut self) {
        let newest = match self.newest_time() {
            Some(t) => t,
            None => return,
        };
        let cutoff = newest.saturating_sub(self.cache_time_ms);
        while let Some(front) = self.samples.front() {
            if front.time < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Latest sample, if any
    pub fn newest(&self) -> Option<&Transform> {
        self.samples.back()
    }

    /// Query the buffered series at `time_ms`
    ///
    /// `TIME_LATEST` (0) returns the newest sample. A single-sample series
    /// answers any time with that sample. Otherwise the two samples
    /// bracketing the requested time are interpolated; times outside the
    /// buffered range fail with [`RctError::Extrapolation`].
    pub fn get(&self, time_ms: u64) -> RctResult<Transform> {
        let newest = self
            .samples
            .back()
            .ok_or_else(|| RctError::Extrapolation {
                requested_ms: time_ms,
                oldest_ms: 0,
                newest_ms: 0,
            })?;

        if time_ms == TIME_LATEST || self.samples.len() == 1 {
            return Ok(if self.samples.len() == 1 {
                self.samples[0].clone()
            } else {
                newest.clone()
            });
        }

        let oldest = self.samples.front().expect("non-empty");
        if time_ms < oldest.time || time_ms > newest.time {
            return Err(RctError::Extrapolation {
                requested_ms: time_ms,
                oldest_ms: oldest.time,
                newest_ms: newest.time,
            });
        }

        let upper = match self.samples.binary_search_by_key(&time_ms, |t| t.time) {
            Ok(pos) => return Ok(self.samples[pos].clone()),
            Err(pos) => pos,
        };
        let before = &self.samples[upper - 1];
        let after = &self.samples[upper];
        let span = (after.time - before.time) as f64;
        let alpha = if span > 0.0 {
            (time_ms - before.time) as f64 / span
        } else {
            0.0
        };
        Ok(before.interpolate(after, alpha))
    }

    /// Remove all samples
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Iterate samples from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Transform> {
        self.samples.iter()
    }
}
