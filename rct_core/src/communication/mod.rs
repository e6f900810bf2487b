//! Abstract wire transport consumed by the transform communicator.
//!
//! The transform system does not prescribe a wire format or broker; it
//! consumes a minimal publish/subscribe contract so different backends can
//! be plugged in interchangeably. Events are opaque payloads plus a header
//! map carrying publisher identity, authority and the static/dynamic flag.

mod communicator;
mod local;

pub use communicator::TransformCommunicator;
pub use local::LocalTransport;

use crate::error::RctResult;
use std::collections::HashMap;
use std::sync::Arc;

/// Logical channel for static transforms
pub const SCOPE_TRANSFORM_STATIC: &str = "/rct/transform/static";
/// Logical channel for dynamic transforms
pub const SCOPE_TRANSFORM_DYNAMIC: &str = "/rct/transform/dynamic";
/// Logical channel for join/re-sync triggers
pub const SCOPE_SYNC: &str = "/rct/sync";

/// Header key: identity of the publishing communicator (echo filter)
pub const HEADER_PUBLISHER: &str = "rct:publisher";
/// Header key: authority string of the transform producer
pub const HEADER_AUTHORITY: &str = "rct:authority";

/// Event envelope: opaque payload plus key/value headers
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    pub payload: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl Envelope {
    /// Create an envelope around a payload
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            headers: HashMap::new(),
        }
    }

    /// Builder-style header attachment
    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key.to_string(), value.into());
        self
    }

    /// Read a header value
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }
}

/// Callback invoked once per received event, non-reentrant per subscriber
pub type DataHandler = Arc<dyn Fn(Envelope) + Send + Sync>;

/// Outbound side of one logical channel
pub trait Publisher: Send + Sync {
    /// Fire-and-forget publish with at-least-once delivery intent;
    /// `reliable` requests transport-level delivery effort where supported
    fn publish(&self, event: Envelope, reliable: bool) -> RctResult<()>;
}

/// Inbound side of one logical channel
pub trait Subscriber: Send + Sync {
    /// Register the callback receiving every event on this channel
    fn register_data_handler(&self, handler: DataHandler);
}

/// Factory for channels on named scopes
pub trait Transport: Send + Sync {
    fn create_publisher(&self, scope: &str) -> RctResult<Box<dyn Publisher>>;
    fn create_subscriber(&self, scope: &str) -> RctResult<Box<dyn Subscriber>>;
}
