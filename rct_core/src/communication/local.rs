//! In-process transport: a shared scope registry dispatching envelopes to
//! registered handlers. Backs single-process wiring and the test suite;
//! distributed deployments plug in a networked [`Transport`] instead.

use super::{DataHandler, Envelope, Publisher, Subscriber, Transport};
use crate::error::RctResult;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type ScopeRegistry = Arc<Mutex<HashMap<String, Vec<DataHandler>>>>;

/// Topic-named in-process bus
///
/// Cloning yields another handle onto the same bus; publishers and
/// subscribers created from any clone see each other.
#[derive(Clone, Default)]
pub struct LocalTransport {
    scopes: ScopeRegistry,
}

impl LocalTransport {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for LocalTransport {
    fn create_publisher(&self, scope: &str) -> RctResult<Box<dyn Publisher>> {
        Ok(Box::new(LocalPublisher {
            scope: scope.to_string(),
            scopes: Arc::clone(&self.scopes),
        }))
    }

    fn create_subscriber(&self, scope: &str) -> RctResult<Box<dyn Subscriber>> {
        Ok(Box::new(LocalSubscriber {
            scope: scope.to_string(),
            scopes: Arc::clone(&self.scopes),
        }))
    }
}

struct LocalPublisher {
    scope: String,
    scopes: ScopeRegistry,
}

impl Publisher for LocalPublisher {
    fn publish(&self, event: Envelope, _reliable: bool) -> RctResult<()> {
        // Snapshot handlers under the lock, dispatch outside it so a
        // handler may publish again without deadlocking.
        let handlers: Vec<DataHandler> = self
            .scopes
            .lock()
            .get(&self.scope)
            .cloned()
            .unwrap_or_default();
        for handler in handlers {
            handler(event.clone());
        }
        Ok(())
    }
}

struct LocalSubscriber {
    scope: String,
    scopes: ScopeRegistry,
}

impl Subscriber for LocalSubscriber {
    fn register_data_handler(&self, handler: DataHandler) {
        self.scopes
            .lock()
            .entry(self.scope.clone())
            .or_default()
            .push(handler);
    }
}
