//! Transform communicator: bridges the core to the wire transport and
//! implements the inter-process consistency (sync) protocol.
//!
//! Outgoing transforms are deduplicated against a send-cache and published
//! on the static or dynamic channel with identity and authority headers.
//! Incoming events are filtered against this communicator's own publisher
//! id (echo suppression), decoded and forwarded to registered listeners.
//! A peer receiving a foreign sync trigger replays its entire send-cache on
//! a worker thread, bringing late joiners up to date without a broker.

use super::{
    Envelope, Publisher, Subscriber, Transport, HEADER_AUTHORITY, HEADER_PUBLISHER, SCOPE_SYNC,
    SCOPE_TRANSFORM_DYNAMIC, SCOPE_TRANSFORM_STATIC,
};
use crate::core::{TransformListener, TransformerCore};
use crate::error::{RctError, RctResult};
use crate::transform::{Transform, TransformType};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::thread;
use uuid::Uuid;

type EdgeKey = (String, String);

struct Channels {
    static_pub: Box<dyn Publisher>,
    dynamic_pub: Box<dyn Publisher>,
    sync_pub: Box<dyn Publisher>,
    // Held so transport backends that tie subscription lifetime to the
    // subscriber object keep delivering.
    _subscribers: Vec<Box<dyn Subscriber>>,
}

/// Wire-layer endpoint for one process's transform traffic
pub struct TransformCommunicator {
    authority: String,
    publisher_id: String,
    send_cache: Mutex<HashMap<EdgeKey, (Transform, TransformType)>>,
    listeners: Mutex<Vec<Arc<dyn TransformListener>>>,
    core: Mutex<Option<Arc<TransformerCore>>>,
    channels: Mutex<Option<Channels>>,
}

impl TransformCommunicator {
    /// Create an unconnected communicator publishing under `authority`
    ///
    /// The publisher id carries a random UUID so communicators sharing an
    /// authority string, even in separate processes, never mistake each
    /// other's traffic for their own echoes.
    pub fn new(authority: impl Into<String>) -> Arc<Self> {
        let authority = authority.into();
        let publisher_id = format!("{}/{}", authority, Uuid::new_v4());
        Arc::new(Self {
            authority,
            publisher_id,
            send_cache: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
            core: Mutex::new(None),
            channels: Mutex::new(None),
        })
    }

    /// Authority string stamped on outgoing transforms without one
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Unique identity used for echo suppression
    pub fn publisher_id(&self) -> &str {
        &self.publisher_id
    }

    /// Register a sink for inbound transforms (typically the core)
    pub fn add_listener(&self, listener: Arc<dyn TransformListener>) {
        self.listeners.lock().push(listener);
    }

    /// Wire the local core used for the static send self-heal check
    pub fn set_core(&self, core: Arc<TransformerCore>) {
        *self.core.lock() = Some(core);
    }

    /// Open all channels on `transport` and issue the initial sync request
    pub fn connect(self: &Arc<Self>, transport: &dyn Transport) -> RctResult<()> {
        let static_pub = transport.create_publisher(SCOPE_TRANSFORM_STATIC)?;
        let dynamic_pub = transport.create_publisher(SCOPE_TRANSFORM_DYNAMIC)?;
        let sync_pub = transport.create_publisher(SCOPE_SYNC)?;

        let static_sub = transport.create_subscriber(SCOPE_TRANSFORM_STATIC)?;
        let dynamic_sub = transport.create_subscriber(SCOPE_TRANSFORM_DYNAMIC)?;
        let sync_sub = transport.create_subscriber(SCOPE_SYNC)?;

        let weak = Arc::downgrade(self);
        static_sub.register_data_handler(handler(&weak, |this, env| {
            this.handle_transform(env, true)
        }));
        let weak = Arc::downgrade(self);
        dynamic_sub.register_data_handler(handler(&weak, |this, env| {
            this.handle_transform(env, false)
        }));
        let weak = Arc::downgrade(self);
        sync_sub.register_data_handler(handler(&weak, |this, env| this.handle_sync(env)));

        *self.channels.lock() = Some(Channels {
            static_pub,
            dynamic_pub,
            sync_pub,
            _subscribers: vec![static_sub, dynamic_sub, sync_sub],
        });

        self.request_sync()
    }

    /// Whether `connect` has succeeded and `shutdown` has not been called
    pub fn is_connected(&self) -> bool {
        self.channels.lock().is_some()
    }

    /// Publish a transform, deduplicating against the send-cache
    ///
    /// Static: skipped when the value is unchanged (ignoring time) and the
    /// local core, if wired, already holds an equal value; a disagreeing
    /// core forces a re-publish so remote caches can heal. Dynamic: skipped
    /// only on exact equality including the timestamp.
    pub fn send_transform(
        &self,
        mut transform: Transform,
        transform_type: TransformType,
    ) -> RctResult<()> {
        if transform.authority.is_empty() {
            transform.authority = self.authority.clone();
        }
        let key = (
            transform.parent_frame.clone(),
            transform.child_frame.clone(),
        );
        {
            let mut cache = self.send_cache.lock();
            if let Some((cached, cached_type)) = cache.get(&key) {
                let skip = match transform_type {
                    TransformType::Static => {
                        *cached_type == TransformType::Static
                            && cached.equals_without_time(&transform)
                            && self.core_agrees(&transform)
                    }
                    TransformType::Dynamic => {
                        *cached_type == TransformType::Dynamic && *cached == transform
                    }
                };
                if skip {
                    log::debug!("suppressing unchanged transform: {transform}");
                    return Ok(());
                }
            }
            cache.insert(key, (transform.clone(), transform_type));
        }
        self.publish_transform(&transform, transform_type)
    }

    /// Publish a sync trigger so peers replay their caches to us
    pub fn request_sync(&self) -> RctResult<()> {
        let envelope =
            Envelope::new(Vec::new()).with_header(HEADER_PUBLISHER, self.publisher_id.clone());
        let channels = self.channels.lock();
        let channels = channels.as_ref().ok_or(RctError::ShutdownInProgress)?;
        channels.sync_pub.publish(envelope, true)
    }

    /// Release wire resources; idempotent
    pub fn shutdown(&self) {
        *self.channels.lock() = None;
    }

    fn core_agrees(&self, transform: &Transform) -> bool {
        match self.core.lock().as_ref() {
            Some(core) => core.holds_static_value(transform),
            None => true,
        }
    }

    fn publish_transform(
        &self,
        transform: &Transform,
        transform_type: TransformType,
    ) -> RctResult<()> {
        let payload =
            bincode::serialize(transform).map_err(|e| RctError::Transport(e.to_string()))?;
        let envelope = Envelope::new(payload)
            .with_header(HEADER_PUBLISHER, self.publisher_id.clone())
            .with_header(HEADER_AUTHORITY, transform.authority.clone());

        let channels = self.channels.lock();
        let channels = channels.as_ref().ok_or(RctError::ShutdownInProgress)?;
        match transform_type {
            TransformType::Static => channels.static_pub.publish(envelope, true),
            TransformType::Dynamic => channels.dynamic_pub.publish(envelope, true),
        }
    }

    fn handle_transform(&self, envelope: Envelope, is_static: bool) {
        if envelope.header(HEADER_PUBLISHER) == Some(&self.publisher_id) {
            return;
        }
        let mut transform = match decode_transform(&envelope.payload) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("dropping undecodable transform event: {e}");
                return;
            }
        };
        if let Some(authority) = envelope.header(HEADER_AUTHORITY) {
            transform.authority = authority.to_string();
        }

        let listeners: Vec<Arc<dyn TransformListener>> = self.listeners.lock().clone();
        for listener in listeners {
            listener.new_transform_available(transform.clone(), is_static);
        }
    }

    fn handle_sync(self: &Arc<Self>, envelope: Envelope) {
        if envelope.header(HEADER_PUBLISHER) == Some(&self.publisher_id) {
            return;
        }
        log::debug!(
            "{}: sync requested by {:?}, replaying send cache",
            self.publisher_id,
            envelope.header(HEADER_PUBLISHER)
        );
        // Replay on a worker so the dispatch thread never publishes while
        // a caller holds the send-cache lock.
        let this = Arc::clone(self);
        thread::spawn(move || this.replay_send_cache());
    }

    fn replay_send_cache(&self) {
        let snapshot: Vec<(Transform, TransformType)> =
            self.send_cache.lock().values().cloned().collect();
        for (transform, transform_type) in snapshot {
            if let Err(e) = self.publish_transform(&transform, transform_type) {
                log::warn!("sync replay failed for {transform}: {e}");
            }
        }
    }
}

fn decode_transform(payload: &[u8]) -> RctResult<Transform> {
    bincode::deserialize(payload).map_err(|e| RctError::Decode(e.to_string()))
}

fn handler<F>(weak: &Weak<TransformCommunicator>, f: F) -> super::DataHandler
where
    F: Fn(&Arc<TransformCommunicator>, Envelope) + Send + Sync + 'static,
{
    let weak = weak.clone();
    Arc::new(move |envelope: Envelope| {
        if let Some(this) = weak.upgrade() {
            f(&this, envelope);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::super::LocalTransport;
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{UnitQuaternion, Vector3};
    use parking_lot::Mutex as PlMutex;
    use std::time::{Duration, Instant};

    fn tf(parent: &str, child: &str, x: f64, time: u64) -> Transform {
        Transform::new(
            parent,
            child,
            UnitQuaternion::identity(),
            Vector3::new(x, 0.0, 0.0),
            time,
            "test-authority",
        )
    }

    /// Transport decorator counting publishes per scope
    struct CountingTransport {
        inner: LocalTransport,
        counts: Arc<PlMutex<HashMap<String, usize>>>,
    }

    impl CountingTransport {
        fn new(inner: LocalTransport) -> Self {
            Self {
                inner,
                counts: Arc::new(PlMutex::new(HashMap::new())),
            }
        }

        fn count(&self, scope: &str) -> usize {
            self.counts.lock().get(scope).copied().unwrap_or(0)
        }
    }

    impl Transport for CountingTransport {
        fn create_publisher(&self, scope: &str) -> RctResult<Box<dyn Publisher>> {
            Ok(Box::new(CountingPublisher {
                scope: scope.to_string(),
                counts: Arc::clone(&self.counts),
                inner: self.inner.create_publisher(scope)?,
            }))
        }

        fn create_subscriber(&self, scope: &str) -> RctResult<Box<dyn Subscriber>> {
            self.inner.create_subscriber(scope)
        }
    }

    struct CountingPublisher {
        scope: String,
        counts: Arc<PlMutex<HashMap<String, usize>>>,
        inner: Box<dyn Publisher>,
    }

    impl Publisher for CountingPublisher {
        fn publish(&self, event: Envelope, reliable: bool) -> RctResult<()> {
            *self.counts.lock().entry(self.scope.clone()).or_insert(0) += 1;
            self.inner.publish(event, reliable)
        }
    }

    /// Listener recording every delivery
    #[derive(Default)]
    struct RecordingListener {
        received: PlMutex<Vec<(Transform, bool)>>,
    }

    impl TransformListener for RecordingListener {
        fn new_transform_available(&self, transform: Transform, is_static: bool) {
            self.received.lock().push((transform, is_static));
        }
    }

    impl RecordingListener {
        fn len(&self) -> usize {
            self.received.lock().len()
        }

        fn wait_for(&self, n: usize, timeout: Duration) -> bool {
            let deadline = Instant::now() + timeout;
            while Instant::now() < deadline {
                if self.len() >= n {
                    return true;
                }
                thread::sleep(Duration::from_millis(5));
            }
            self.len() >= n
        }
    }

    #[test]
    fn test_static_dedup_publishes_once() {
        let transport = CountingTransport::new(LocalTransport::new());
        let comm = TransformCommunicator::new("pub-a");
        comm.connect(&transport).unwrap();

        comm.send_transform(tf("a", "b", 1.0, 100), TransformType::Static)
            .unwrap();
        comm.send_transform(tf("a", "b", 1.0, 200), TransformType::Static)
            .unwrap();

        assert_eq!(transport.count(SCOPE_TRANSFORM_STATIC), 1);
    }

    #[test]
    fn test_static_value_change_republishes() {
        let transport = CountingTransport::new(LocalTransport::new());
        let comm = TransformCommunicator::new("pub-a");
        comm.connect(&transport).unwrap();

        comm.send_transform(tf("a", "b", 1.0, 100), TransformType::Static)
            .unwrap();
        comm.send_transform(tf("a", "b", 2.0, 200), TransformType::Static)
            .unwrap();

        assert_eq!(transport.count(SCOPE_TRANSFORM_STATIC), 2);
    }

    #[test]
    fn test_dynamic_always_publishes_on_time_change() {
        let transport = CountingTransport::new(LocalTransport::new());
        let comm = TransformCommunicator::new("pub-a");
        comm.connect(&transport).unwrap();

        comm.send_transform(tf("a", "b", 1.0, 100), TransformType::Dynamic)
            .unwrap();
        comm.send_transform(tf("a", "b", 1.0, 200), TransformType::Dynamic)
            .unwrap();

        assert_eq!(transport.count(SCOPE_TRANSFORM_DYNAMIC), 2);
    }

    #[test]
    fn test_dynamic_exact_duplicate_suppressed() {
        let transport = CountingTransport::new(LocalTransport::new());
        let comm = TransformCommunicator::new("pub-a");
        comm.connect(&transport).unwrap();

        comm.send_transform(tf("a", "b", 1.0, 100), TransformType::Dynamic)
            .unwrap();
        comm.send_transform(tf("a", "b", 1.0, 100), TransformType::Dynamic)
            .unwrap();

        assert_eq!(transport.count(SCOPE_TRANSFORM_DYNAMIC), 1);
    }

    #[test]
    fn test_own_echo_filtered() {
        let bus = LocalTransport::new();
        let comm = TransformCommunicator::new("pub-a");
        let listener = Arc::new(RecordingListener::default());
        comm.add_listener(listener.clone());
        comm.connect(&bus).unwrap();

        comm.send_transform(tf("a", "b", 1.0, 100), TransformType::Static)
            .unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(listener.len(), 0);
    }

    #[test]
    fn test_peer_receives_with_flag_and_authority() {
        let bus = LocalTransport::new();
        let sender = TransformCommunicator::new("sender");
        sender.connect(&bus).unwrap();

        let receiver = TransformCommunicator::new("receiver");
        let listener = Arc::new(RecordingListener::default());
        receiver.add_listener(listener.clone());
        receiver.connect(&bus).unwrap();

        sender
            .send_transform(tf("a", "b", 1.0, 100), TransformType::Static)
            .unwrap();
        sender
            .send_transform(tf("a", "c", 2.0, 100), TransformType::Dynamic)
            .unwrap();

        assert!(listener.wait_for(2, Duration::from_secs(2)));
        let received = listener.received.lock();
        let (st, st_flag) = received
            .iter()
            .find(|(t, _)| t.child_frame == "b")
            .cloned()
            .unwrap();
        assert!(st_flag);
        assert_eq!(st.authority, "test-authority");
        assert_relative_eq!(st.translation.x, 1.0);
        let (_, dyn_flag) = received
            .iter()
            .find(|(t, _)| t.child_frame == "c")
            .cloned()
            .unwrap();
        assert!(!dyn_flag);
    }

    #[test]
    fn test_sync_replays_full_cache_to_late_joiner() {
        let bus = LocalTransport::new();
        let veteran = TransformCommunicator::new("veteran");
        veteran.connect(&bus).unwrap();
        veteran
            .send_transform(tf("a", "b", 1.0, 100), TransformType::Static)
            .unwrap();
        veteran
            .send_transform(tf("b", "c", 2.0, 100), TransformType::Static)
            .unwrap();
        veteran
            .send_transform(tf("c", "d", 3.0, 100), TransformType::Dynamic)
            .unwrap();

        // Late joiner: connect() issues the sync request
        let joiner = TransformCommunicator::new("joiner");
        let listener = Arc::new(RecordingListener::default());
        joiner.add_listener(listener.clone());
        joiner.connect(&bus).unwrap();

        assert!(listener.wait_for(3, Duration::from_secs(2)));
        let received = listener.received.lock();
        assert_eq!(received.len(), 3);
        assert!(received.iter().all(|(t, _)| t.authority == "test-authority"));
    }

    #[test]
    fn test_sync_request_does_not_echo_own_cache() {
        let bus = LocalTransport::new();
        let comm = TransformCommunicator::new("solo");
        let listener = Arc::new(RecordingListener::default());
        comm.add_listener(listener.clone());
        comm.connect(&bus).unwrap();
        comm.send_transform(tf("a", "b", 1.0, 100), TransformType::Static)
            .unwrap();

        comm.request_sync().unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(listener.len(), 0);
    }

    #[test]
    fn test_undecodable_event_dropped() {
        let bus = LocalTransport::new();
        let comm = TransformCommunicator::new("receiver");
        let listener = Arc::new(RecordingListener::default());
        comm.add_listener(listener.clone());
        comm.connect(&bus).unwrap();

        let raw = bus.create_publisher(SCOPE_TRANSFORM_STATIC).unwrap();
        raw.publish(
            Envelope::new(vec![0xde, 0xad]).with_header(HEADER_PUBLISHER, "someone-else"),
            true,
        )
        .unwrap();

        thread::sleep(Duration::from_millis(20));
        assert_eq!(listener.len(), 0);
    }

    #[test]
    fn test_send_after_shutdown_fails() {
        let bus = LocalTransport::new();
        let comm = TransformCommunicator::new("pub-a");
        comm.connect(&bus).unwrap();
        comm.shutdown();

        assert!(!comm.is_connected());
        assert!(matches!(
            comm.send_transform(tf("a", "b", 1.0, 100), TransformType::Static),
            Err(RctError::ShutdownInProgress)
        ));
    }

    #[test]
    fn test_unique_publisher_ids() {
        let a = TransformCommunicator::new("same");
        let b = TransformCommunicator::new("same");
        assert_ne!(a.publisher_id(), b.publisher_id());

        // The instance part must be a random UUID, not a process-local
        // counter: equally named communicators in separate processes would
        // otherwise collide and drop each other's traffic as echoes.
        let instance = a.publisher_id().rsplit('/').next().unwrap();
        assert!(Uuid::parse_str(instance).is_ok());
    }

    #[test]
    fn test_decode_failure_is_typed() {
        assert!(matches!(
            decode_transform(&[0xde, 0xad]),
            Err(RctError::Decode(_))
        ));
    }
}
