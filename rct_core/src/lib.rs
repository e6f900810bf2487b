//! # RCT Core
//!
//! A distributed coordinate-frame transform cache: independent processes
//! publish and query rigid transforms (rotation + translation) between
//! named reference frames over a publish/subscribe bus, with time-aware
//! interpolation and a tree-synchronization protocol for late joiners.
//!
//! Building blocks:
//!
//! - **Transform**: immutable snapshot of a rigid transform between a
//!   parent and child frame at a point in time, with authority attribution
//! - **TransformerCore**: in-process time-indexed cache answering point
//!   and interpolated lookups, composing chains across the frame graph
//! - **TransformCommunicator**: bridges the core to the wire transport and
//!   implements the sync protocol (cache replay on join)
//! - **TransformPublisher / TransformReceiver**: user-facing handles built
//!   by the **TransformerFactory**
//!
//! ## Quick Start
//!
//! ```rust
//! use rct_core::{
//!     LocalTransport, Transform, TransformType, TransformerConfig, TransformerFactory,
//! };
//! use nalgebra::{UnitQuaternion, Vector3};
//!
//! let bus = LocalTransport::new();
//! let publisher =
//!     TransformerFactory::create_publisher(&TransformerConfig::new("demo"), &bus).unwrap();
//! let receiver =
//!     TransformerFactory::create_receiver(&TransformerConfig::new("demo"), &bus).unwrap();
//!
//! publisher
//!     .send_transform(
//!         Transform::new(
//!             "world",
//!             "robot",
//!             UnitQuaternion::identity(),
//!             Vector3::new(1.0, 0.0, 0.0),
//!             100,
//!             "demo",
//!         ),
//!         TransformType::Static,
//!     )
//!     .unwrap();
//!
//! let tf = receiver.lookup_transform("world", "robot", 100).unwrap();
//! assert!((tf.translation.x - 1.0).abs() < 1e-9);
//! ```

pub mod cache;
pub mod communication;
pub mod core;
pub mod error;
pub mod factory;
pub mod publisher;
pub mod receiver;
pub mod transform;

// Re-export commonly used types for easy access
pub use communication::{
    Envelope, LocalTransport, Publisher, Subscriber, TransformCommunicator, Transport,
};
pub use core::{TransformListener, TransformRequest, TransformerCore};
pub use error::{RctError, RctResult};
pub use factory::{TransformerConfig, TransformerFactory};
pub use publisher::TransformPublisher;
pub use receiver::TransformReceiver;
pub use transform::{Transform, TransformType};

/// Current timestamp in milliseconds since the epoch
pub fn timestamp_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_now() {
        let ts = timestamp_now();
        assert!(ts > 0);
    }
}
