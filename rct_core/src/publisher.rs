//! User-facing publisher façade over a [`TransformCommunicator`].

use crate::communication::TransformCommunicator;
use crate::error::{RctError, RctResult};
use crate::transform::{Transform, TransformType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Handle for publishing transforms onto the wire
///
/// Owned by the application's composition root; call [`shutdown`] to
/// release wire resources. Operations after shutdown fail with
/// [`RctError::ShutdownInProgress`].
///
/// [`shutdown`]: TransformPublisher::shutdown
pub struct TransformPublisher {
    communicator: Arc<TransformCommunicator>,
    closed: AtomicBool,
}

impl TransformPublisher {
    pub(crate) fn new(communicator: Arc<TransformCommunicator>) -> Self {
        Self {
            communicator,
            closed: AtomicBool::new(false),
        }
    }

    /// Authority string this publisher stamps on outgoing transforms
    pub fn authority(&self) -> &str {
        self.communicator.authority()
    }

    /// Publish one transform (deduplicated per the communicator's rules)
    pub fn send_transform(
        &self,
        transform: Transform,
        transform_type: TransformType,
    ) -> RctResult<()> {
        self.check_open()?;
        self.communicator.send_transform(transform, transform_type)
    }

    /// Publish several transforms independently
    ///
    /// Not atomic: a failure on entry N leaves entries 1..N-1 published.
    pub fn send_transforms(
        &self,
        transforms: impl IntoIterator<Item = Transform>,
        transform_type: TransformType,
    ) -> RctResult<()> {
        self.check_open()?;
        for transform in transforms {
            self.communicator.send_transform(transform, transform_type)?;
        }
        Ok(())
    }

    /// Release wire resources; idempotent
    pub fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.communicator.shutdown();
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

impl Drop for TransformPublisher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::LocalTransport;
    use nalgebra::{UnitQuaternion, Vector3};

    fn tf(parent: &str, child: &str, time: u64) -> Transform {
        Transform::new(
            parent,
            child,
            UnitQuaternion::identity(),
            Vector3::new(1.0, 0.0, 0.0),
            time,
            "test",
        )
    }

    fn publisher() -> TransformPublisher {
        let comm = TransformCommunicator::new("test");
        comm.connect(&LocalTransport::new()).unwrap();
        TransformPublisher::new(comm)
    }

    #[test]
    fn test_send_set_is_independent() {
        let publisher = publisher();
        let batch = vec![tf("a", "b", 100), tf("b", "c", 100), tf("c", "d", 100)];
        publisher
            .send_transforms(batch, TransformType::Static)
            .unwrap();
    }

    #[test]
    fn test_shutdown_blocks_further_sends() {
        let publisher = publisher();
        publisher.shutdown();
        assert!(matches!(
            publisher.send_transform(tf("a", "b", 100), TransformType::Static),
            Err(RctError::ShutdownInProgress)
        ));
        // Idempotent
        publisher.shutdown();
    }
}
