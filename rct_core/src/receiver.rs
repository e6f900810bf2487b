//! User-facing receiver façade: wire-fed core with lookup operations.

use crate::communication::TransformCommunicator;
use crate::core::{TransformRequest, TransformerCore};
use crate::error::{RctError, RctResult};
use crate::transform::Transform;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Handle for querying transforms received from the wire
///
/// Wraps a [`TransformerCore`] that is registered as listener of the
/// underlying communicator. [`shutdown`] releases wire resources and
/// clears the core's cache; operations after shutdown fail with
/// [`RctError::ShutdownInProgress`].
///
/// [`shutdown`]: TransformReceiver::shutdown
pub struct TransformReceiver {
    communicator: Arc<TransformCommunicator>,
    core: Arc<TransformerCore>,
    closed: AtomicBool,
}

impl TransformReceiver {
    pub(crate) fn new(
        communicator: Arc<TransformCommunicator>,
        core: Arc<TransformerCore>,
    ) -> Self {
        Self {
            communicator,
            core,
            closed: AtomicBool::new(false),
        }
    }

    /// Synchronous lookup of `source` -> `target` at `time_ms` (0 = latest)
    pub fn lookup_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        time_ms: u64,
    ) -> RctResult<Transform> {
        self.check_open()?;
        self.core
            .lookup_transform(target_frame, source_frame, time_ms)
    }

    /// Two-leg lookup through a fixed pivot frame
    pub fn lookup_transform_fixed(
        &self,
        target_frame: &str,
        target_time_ms: u64,
        source_frame: &str,
        source_time_ms: u64,
        fixed_frame: &str,
    ) -> RctResult<Transform> {
        self.check_open()?;
        self.core.lookup_transform_fixed(
            target_frame,
            target_time_ms,
            source_frame,
            source_time_ms,
            fixed_frame,
        )
    }

    /// Asynchronous lookup; the handle resolves when data arrives
    pub fn request_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        time_ms: u64,
    ) -> RctResult<TransformRequest> {
        self.check_open()?;
        Ok(self
            .core
            .request_transform(target_frame, source_frame, time_ms))
    }

    /// Whether a lookup would currently succeed
    pub fn can_transform(&self, target_frame: &str, source_frame: &str, time_ms: u64) -> bool {
        !self.closed.load(Ordering::SeqCst)
            && self.core.can_transform(target_frame, source_frame, time_ms)
    }

    /// Whether a fixed-frame lookup would currently succeed
    pub fn can_transform_fixed(
        &self,
        target_frame: &str,
        target_time_ms: u64,
        source_frame: &str,
        source_time_ms: u64,
        fixed_frame: &str,
    ) -> bool {
        !self.closed.load(Ordering::SeqCst)
            && self.core.can_transform_fixed(
                target_frame,
                target_time_ms,
                source_frame,
                source_time_ms,
                fixed_frame,
            )
    }

    /// Sorted names of all frames seen so far
    pub fn frames(&self) -> Vec<String> {
        self.core.frames()
    }

    /// Re-issue a sync request so peers replay their caches
    pub fn request_sync(&self) -> RctResult<()> {
        self.check_open()?;
        self.communicator.request_sync()
    }

    /// Access the underlying core (e.g. to share it with other components)
    pub fn core(&self) -> &Arc<TransformerCore> {
        &self.core
    }

    /// Release wire resources and clear the cache; idempotent
    pub fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.communicator.shutdown();
            self.core.clear();
        }
    }

    fn check_open(&self) -> RctResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(RctError::ShutdownInProgress)
        } else {
            Ok(())
        }
    }
}

impl Drop for TransformReceiver {
    fn drop(&mut self) {
        self.shutdown();
    }
}
