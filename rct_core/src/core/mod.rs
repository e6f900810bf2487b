//! Transformer core: the in-process authoritative transform store.
//!
//! Holds one [`EdgeCache`] per published `(parent, child)` frame pair and
//! answers lookups between arbitrary frames by resolving a path through the
//! undirected frame graph, inverting and composing edge values as needed.
//! Dynamic edges are interpolated in time. Asynchronous `request_transform`
//! waiters are re-attempted whenever a new transform arrives.

use crate::cache::{EdgeCache, TIME_LATEST};
use crate::error::{RctError, RctResult};
use crate::transform::Transform;
use crossbeam::channel::{bounded, Receiver, Sender};
use nalgebra::Isometry3;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Default cache window for dynamic samples: 30 seconds
pub const DEFAULT_CACHE_TIME_MS: u64 = 30_000;

/// Sink for transforms arriving from the wire
pub trait TransformListener: Send + Sync {
    /// Deliver a received transform; `is_static` carries the wire type flag
    fn new_transform_available(&self, transform: Transform, is_static: bool);
}

type EdgeKey = (String, String);

struct Waiter {
    target: String,
    source: String,
    time_ms: u64,
    tx: Sender<Transform>,
}

#[derive(Default)]
struct CoreState {
    edges: BTreeMap<EdgeKey, EdgeCache>,
    waiters: HashMap<u64, Waiter>,
    next_waiter_id: u64,
}

/// Time-indexed transform cache over a frame graph
pub struct TransformerCore {
    cache_time_ms: u64,
    state: Mutex<CoreState>,
}

impl TransformerCore {
    /// Create a core with the default 30 s cache window
    pub fn new() -> Self {
        Self::with_cache_time(Duration::from_millis(DEFAULT_CACHE_TIME_MS))
    }

    /// Create a core with an explicit cache window for dynamic samples
    pub fn with_cache_time(cache_time: Duration) -> Self {
        Self {
            cache_time_ms: cache_time.as_millis() as u64,
            state: Mutex::new(CoreState::default()),
        }
    }

    /// Cache window in milliseconds
    pub fn cache_time_ms(&self) -> u64 {
        self.cache_time_ms
    }

    /// Insert a transform into the edge cache
    ///
    /// Returns `false` (after logging) for malformed input: empty or equal
    /// frame names, or non-finite values. On success any pending
    /// `request_transform` waiters are re-attempted.
    pub fn insert(&self, transform: Transform, is_static: bool) -> bool {
        if let Err(reason) = validate(&transform) {
            log::warn!("dropping malformed transform ({reason}): {transform}");
            return false;
        }

        let mut state = self.state.lock();
        let key = (
            transform.parent_frame.clone(),
            transform.child_frame.clone(),
        );
        match state.edges.get_mut(&key) {
            Some(entry) => {
                entry.update(transform, is_static, self.cache_time_ms);
            }
            None => {
                let entry = if is_static {
                    EdgeCache::new_static(transform)
                } else {
                    EdgeCache::new_dynamic(transform, self.cache_time_ms)
                };
                state.edges.insert(key, entry);
            }
        }

        Self::retry_waiters(&mut state);
        true
    }

    /// Re-attempt resolution for every registered waiter; fulfilled waiters
    /// are removed. The capacity-1 channel send never blocks this thread.
    fn retry_waiters(state: &mut CoreState) {
        let fulfilled: Vec<u64> = state
            .waiters
            .iter()
            .filter_map(|(&id, waiter)| {
                match resolve(&state.edges, &waiter.target, &waiter.source, waiter.time_ms) {
                    Ok(transform) => {
                        let _ = waiter.tx.try_send(transform);
                        Some(id)
                    }
                    Err(_) => None,
                }
            })
            .collect();
        for id in fulfilled {
            state.waiters.remove(&id);
        }
    }

    /// Resolve the transform mapping `source`-frame coordinates into
    /// `target`-frame coordinates at `time_ms` (0 means "latest")
    pub fn lookup_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        time_ms: u64,
    ) -> RctResult<Transform> {
        let state = self.state.lock();
        resolve(&state.edges, target_frame, source_frame, time_ms)
    }

    /// Two-leg lookup through a fixed frame assumed rigid over the interval
    ///
    /// Transforms `source_frame` at `source_time_ms` into `fixed_frame`,
    /// then `fixed_frame` into `target_frame` at `target_time_ms`.
    pub fn lookup_transform_fixed(
        &self,
        target_frame: &str,
        target_time_ms: u64,
        source_frame: &str,
        source_time_ms: u64,
        fixed_frame: &str,
    ) -> RctResult<Transform> {
        let state = self.state.lock();
        let fixed_to_target = resolve(&state.edges, target_frame, fixed_frame, target_time_ms)?;
        let source_to_fixed = resolve(&state.edges, fixed_frame, source_frame, source_time_ms)?;
        let iso = fixed_to_target.isometry() * source_to_fixed.isometry();
        Ok(Transform::from_isometry(
            target_frame,
            source_frame,
            &iso,
            target_time_ms,
            "",
        ))
    }

    /// Whether `lookup_transform` would currently succeed
    pub fn can_transform(&self, target_frame: &str, source_frame: &str, time_ms: u64) -> bool {
        self.lookup_transform(target_frame, source_frame, time_ms)
            .is_ok()
    }

    /// Whether `lookup_transform_fixed` would currently succeed
    pub fn can_transform_fixed(
        &self,
        target_frame: &str,
        target_time_ms: u64,
        source_frame: &str,
        source_time_ms: u64,
        fixed_frame: &str,
    ) -> bool {
        self.lookup_transform_fixed(
            target_frame,
            target_time_ms,
            source_frame,
            source_time_ms,
            fixed_frame,
        )
        .is_ok()
    }

    /// Asynchronous lookup: returns a handle fulfilled now if resolvable,
    /// otherwise upon a future insert completing the missing edge(s)
    ///
    /// There is no implicit timeout; use [`TransformRequest::wait_timeout`]
    /// or drop the handle to cancel.
    pub fn request_transform(
        self: &Arc<Self>,
        target_frame: &str,
        source_frame: &str,
        time_ms: u64,
    ) -> TransformRequest {
        let (tx, rx) = bounded(1);
        let mut state = self.state.lock();

        if let Ok(transform) = resolve(&state.edges, target_frame, source_frame, time_ms) {
            let _ = tx.try_send(transform);
            return TransformRequest {
                id: None,
                rx,
                core: Weak::new(),
            };
        }

        let id = state.next_waiter_id;
        state.next_waiter_id += 1;
        state.waiters.insert(
            id,
            Waiter {
                target: target_frame.to_string(),
                source: source_frame.to_string(),
                time_ms,
                tx,
            },
        );
        TransformRequest {
            id: Some(id),
            rx,
            core: Arc::downgrade(self),
        }
    }

    /// Whether the cache already holds a static entry for this transform's
    /// edge with an equal value (ignoring time)
    ///
    /// Used by the communicator's static send dedup: a missing or
    /// disagreeing entry forces a re-publish so remote caches can heal.
    pub fn holds_static_value(&self, transform: &Transform) -> bool {
        let state = self.state.lock();
        let key = (
            transform.parent_frame.clone(),
            transform.child_frame.clone(),
        );
        match state.edges.get(&key) {
            Some(EdgeCache::Static(stored)) => stored.equals_without_time(transform),
            _ => false,
        }
    }

    /// Sorted list of all frame names seen so far
    pub fn frames(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut names = BTreeSet::new();
        for (parent, child) in state.edges.keys() {
            names.insert(parent.clone());
            names.insert(child.clone());
        }
        names.into_iter().collect()
    }

    /// Drop all cached edges and abort pending requests
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.edges.clear();
        state.waiters.clear();
    }

    fn cancel_waiter(&self, id: u64) {
        self.state.lock().waiters.remove(&id);
    }
}

impl Default for TransformerCore {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformListener for TransformerCore {
    fn new_transform_available(&self, transform: Transform, is_static: bool) {
        self.insert(transform, is_static);
    }
}

/// Pending result of [`TransformerCore::request_transform`]
///
/// Dropping the handle cancels the registered interest without affecting
/// other waiters on the same edge.
pub struct TransformRequest {
    id: Option<u64>,
    rx: Receiver<Transform>,
    core: Weak<TransformerCore>,
}

impl TransformRequest {
    /// Block until the transform becomes resolvable
    pub fn wait(&self) -> RctResult<Transform> {
        self.rx.recv().map_err(|_| RctError::ShutdownInProgress)
    }

    /// Block up to `timeout`; `Ok(None)` when it elapses unfulfilled
    pub fn wait_timeout(&self, timeout: Duration) -> RctResult<Option<Transform>> {
        match self.rx.recv_timeout(timeout) {
            Ok(transform) => Ok(Some(transform)),
            Err(crossbeam::channel::RecvTimeoutError::Timeout) => Ok(None),
            Err(crossbeam::channel::RecvTimeoutError::Disconnected) => {
                Err(RctError::ShutdownInProgress)
            }
        }
    }

    /// Non-blocking poll
    pub fn try_get(&self) -> Option<Transform> {
        self.rx.try_recv().ok()
    }

    /// Remove the registered interest
    pub fn cancel(&mut self) {
        if let (Some(id), Some(core)) = (self.id.take(), self.core.upgrade()) {
            core.cancel_waiter(id);
        }
    }
}

impl Drop for TransformRequest {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn validate(transform: &Transform) -> Result<(), &'static str> {
    if transform.parent_frame.is_empty() || transform.child_frame.is_empty() {
        return Err("empty frame name");
    }
    if transform.parent_frame == transform.child_frame {
        return Err("parent and child frame are equal");
    }
    if !transform.translation.iter().all(|v| v.is_finite())
        || !transform.rotation.coords.iter().all(|v| v.is_finite())
    {
        return Err("non-finite values");
    }
    Ok(())
}

/// Resolve `source` -> `target` over the cached edge graph at `time_ms`.
///
/// Breadth-first search over the undirected edge set; ambiguous diamond
/// topologies are broken deterministically by fewest hops first, then
/// lexical frame-name order of neighbor expansion.
fn resolve(
    edges: &BTreeMap<EdgeKey, EdgeCache>,
    target_frame: &str,
    source_frame: &str,
    time_ms: u64,
) -> RctResult<Transform> {
    if target_frame == source_frame {
        return Ok(Transform::identity(target_frame, source_frame, time_ms));
    }

    // Direct edge: answer from the stored entry so the sample's own
    // timestamp and authority survive.
    if let Some(entry) = edges.get(&(target_frame.to_string(), source_frame.to_string())) {
        return entry.get(time_ms);
    }

    let mut adjacency: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (parent, child) in edges.keys() {
        adjacency.entry(parent).or_default().insert(child);
        adjacency.entry(child).or_default().insert(parent);
    }

    if !adjacency.contains_key(source_frame) {
        return Err(RctError::FrameNotAvailable(source_frame.to_string()));
    }
    if !adjacency.contains_key(target_frame) {
        return Err(RctError::FrameNotAvailable(target_frame.to_string()));
    }

    let path = find_path(&adjacency, source_frame, target_frame).ok_or_else(|| {
        RctError::NoPathAvailable {
            from: source_frame.to_string(),
            to: target_frame.to_string(),
        }
    })?;

    // Walk source -> target, accumulating the operator that maps source
    // coordinates into target coordinates. An edge stored as (a, b) maps
    // b-coordinates into a-coordinates; use it directly when stepping
    // b -> a and inverted when stepping a -> b.
    let mut acc = Isometry3::identity();
    for pair in path.windows(2) {
        let (from, to) = (pair[0].as_str(), pair[1].as_str());
        let step = if let Some(entry) = edges.get(&(to.to_string(), from.to_string())) {
            entry.get(time_ms)?.isometry()
        } else if let Some(entry) = edges.get(&(from.to_string(), to.to_string())) {
            entry.get(time_ms)?.isometry().inverse()
        } else {
            return Err(RctError::NoPathAvailable {
                from: source_frame.to_string(),
                to: target_frame.to_string(),
            });
        };
        acc = step * acc;
    }

    let stamp = if time_ms == TIME_LATEST {
        newest_time_on_path(edges, &path)
    } else {
        time_ms
    };
    Ok(Transform::from_isometry(
        target_frame,
        source_frame,
        &acc,
        stamp,
        "",
    ))
}

/// BFS shortest path; neighbors expand in lexical order so equal-length
/// alternatives resolve deterministically
fn find_path(
    adjacency: &BTreeMap<&str, BTreeSet<&str>>,
    source: &str,
    target: &str,
) -> Option<Vec<String>> {
    let mut predecessor: BTreeMap<&str, &str> = BTreeMap::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(source);
    predecessor.insert(source, source);

    while let Some(current) = queue.pop_front() {
        if current == target {
            let mut path = vec![target.to_string()];
            let mut node = target;
            while node != source {
                node = predecessor[node];
                path.push(node.to_string());
            }
            path.reverse();
            return Some(path);
        }
        if let Some(neighbors) = adjacency.get(current) {
            for &next in neighbors {
                if !predecessor.contains_key(next) {
                    predecessor.insert(next, current);
                    queue.push_back(next);
                }
            }
        }
    }
    None
}

/// Most recent stamp along a resolved path, used for "latest" lookups
fn newest_time_on_path(edges: &BTreeMap<EdgeKey, EdgeCache>, path: &[String]) -> u64 {
    let mut newest = 0;
    for pair in path.windows(2) {
        let (from, to) = (pair[0].clone(), pair[1].clone());
        let entry = edges
            .get(&(to.clone(), from.clone()))
            .or_else(|| edges.get(&(from, to)));
        if let Some(t) = entry.and_then(|e| e.newest()) {
            newest = newest.max(t.time);
        }
    }
    newest
}
