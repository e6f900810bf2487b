//! Factory wiring communicators, cores and façades together.
//!
//! The factory is the composition root: it builds one communicator per
//! handle (plus one core for receivers, registered as transform listener),
//! connects it to the supplied transport and fails fast if the transport
//! cannot be initialized. There is no hidden global state; callers own the
//! returned handles and release them with `shutdown()`.

use crate::communication::{TransformCommunicator, Transport};
use crate::core::{TransformerCore, DEFAULT_CACHE_TIME_MS};
use crate::error::{RctError, RctResult};
use crate::publisher::TransformPublisher;
use crate::receiver::TransformReceiver;
use std::sync::Arc;
use std::time::Duration;

/// Construction-time settings for publishers and receivers
#[derive(Debug, Clone)]
pub struct TransformerConfig {
    /// Authority string stamped on published transforms
    pub authority: String,
    /// Sliding window for dynamic transform samples
    pub cache_time: Duration,
}

impl TransformerConfig {
    /// Config with an explicit authority and the default cache window
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            ..Self::default()
        }
    }

    /// Override the dynamic sample cache window
    pub fn with_cache_time(mut self, cache_time: Duration) -> Self {
        self.cache_time = cache_time;
        self
    }
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            authority: format!("rct-{}", std::process::id()),
            cache_time: Duration::from_millis(DEFAULT_CACHE_TIME_MS),
        }
    }
}

/// Builder for wired-together transform handles
pub struct TransformerFactory;

impl TransformerFactory {
    /// Build a connected [`TransformPublisher`]
    ///
    /// Fails fast with [`RctError::Factory`] if the transport cannot be
    /// initialized; no partial object is returned.
    pub fn create_publisher(
        config: &TransformerConfig,
        transport: &dyn Transport,
    ) -> RctResult<TransformPublisher> {
        let communicator = TransformCommunicator::new(config.authority.clone());
        communicator
            .connect(transport)
            .map_err(|e| RctError::Factory(e.to_string()))?;
        Ok(TransformPublisher::new(communicator))
    }

    /// Build a connected [`TransformReceiver`] with its own core
    pub fn create_receiver(
        config: &TransformerConfig,
        transport: &dyn Transport,
    ) -> RctResult<TransformReceiver> {
        let core = Arc::new(TransformerCore::with_cache_time(config.cache_time));
        let communicator = TransformCommunicator::new(config.authority.clone());
        communicator.add_listener(core.clone());
        communicator.set_core(core.clone());
        communicator
            .connect(transport)
            .map_err(|e| RctError::Factory(e.to_string()))?;
        Ok(TransformReceiver::new(communicator, core))
    }
}
