//! Per-edge transform cache entries.
//!
//! Each known `(parent, child)` frame pair holds either a single static
//! transform (replaced only when the value changes) or a [`TimeBuffer`] of
//! dynamic samples.

mod buffer;

pub use buffer::{TimeBuffer, TIME_LATEST};

use crate::error::RctResult;
use crate::transform::Transform;

/// Cache entry for one frame edge
#[derive(Debug, Clone)]
pub enum EdgeCache {
    /// Single value, assumed constant over time
    Static(Transform),
    /// Ordered time series within the cache window
    Dynamic(TimeBuffer),
}

impl EdgeCache {
    /// Create a static entry
    pub fn new_static(transform: Transform) -> Self {
        EdgeCache::Static(transform)
    }

    /// Create a dynamic entry seeded with one sample
    pub fn new_dynamic(transform: Transform, cache_time_ms: u64) -> Self {
        let mut buffer = TimeBuffer::new(cache_time_ms);
        buffer.insert(transform);
        EdgeCache::Dynamic(buffer)
    }

    /// Insert/update with a new publication
    ///
    /// Returns `true` when the entry changed. A static re-publication with
    /// an unchanged value (ignoring time) is a no-op; a dynamic sample is
    /// always appended. A type flip replaces the whole entry.
    pub fn update(&mut self, transform: Transform, is_static: bool, cache_time_ms: u64) -> bool {
        match (self, is_static) {
            (EdgeCache::Static(stored), true) => {
                if stored.equals_without_time(&transform) {
                    false
                } else {
                    *stored = transform;
                    true
                }
            }
            (EdgeCache::Dynamic(buffer), false) => {
                buffer.insert(transform);
                true
            }
            (entry, true) => {
                *entry = EdgeCache::new_static(transform);
                true
            }
            (entry, false) => {
                *entry = EdgeCache::new_dynamic(transform, cache_time_ms);
                true
            }
        }
    }

    /// Query the entry at `time_ms`
    ///
    /// A static entry answers any requested time with its stored value.
    pub fn get(&self, time_ms: u64) -> RctResult<Transform> {
        match self {
            EdgeCache::Static(transform) => Ok(transform.clone()),
            EdgeCache::Dynamic(buffer) => buffer.get(time_ms),
        }
    }

    /// The stored value with the most recent timestamp, if any
    pub fn newest(&self) -> Option<&Transform> {
        match self {
            EdgeCache::Static(transform) => Some(transform),
            EdgeCache::Dynamic(buffer) => buffer.newest(),
        }
    }

    /// Whether this entry is static
    pub fn is_static(&self) -> bool {
        matches!(self, EdgeCache::Static(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{UnitQuaternion, Vector3};

    fn tf(x: f64, time: u64) -> Transform {
        Transform::new(
            "a",
            "b",
            UnitQuaternion::identity(),
            Vector3::new(x, 0.0, 0.0),
            time,
            "test",
        )
    }

    #[test]
    fn test_static_answers_any_time() {
        let entry = EdgeCache::new_static(tf(1.0, 100));
        assert_relative_eq!(entry.get(0).unwrap().translation.x, 1.0);
        assert_relative_eq!(entry.get(99_999).unwrap().translation.x, 1.0);
    }

    #[test]
    fn test_static_value_dedup() {
        let mut entry = EdgeCache::new_static(tf(1.0, 100));
        // Same value, newer stamp: no change
        assert!(!entry.update(tf(1.0, 200), true, 10_000));
        assert_eq!(entry.get(0).unwrap().time, 100);
        // New value replaces
        assert!(entry.update(tf(2.0, 300), true, 10_000));
        assert_relative_eq!(entry.get(0).unwrap().translation.x, 2.0);
    }

    #[test]
    fn test_dynamic_appends() {
        let mut entry = EdgeCache::new_dynamic(tf(0.0, 0), 10_000);
        assert!(entry.update(tf(10.0, 1000), false, 10_000));
        assert_relative_eq!(entry.get(500).unwrap().translation.x, 5.0);
    }

    #[test]
    fn test_type_flip_replaces_entry() {
        let mut entry = EdgeCache::new_dynamic(tf(1.0, 100), 10_000);
        assert!(entry.update(tf(5.0, 200), true, 10_000));
        assert!(entry.is_static());
        assert_relative_eq!(entry.get(0).unwrap().translation.x, 5.0);
    }
}
