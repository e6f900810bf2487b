//! # RCT - distributed coordinate-frame transforms
//!
//! Unified entry point re-exporting [`rct_core`]: publish and query rigid
//! transforms between named frames across processes, with time-aware
//! interpolation and cache replay for late-joining subscribers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rct::prelude::*;
//!
//! let bus = LocalTransport::new();
//! let receiver =
//!     TransformerFactory::create_receiver(&TransformerConfig::new("app"), &bus).unwrap();
//!
//! if receiver.can_transform("world", "camera", 0) {
//!     let tf = receiver.lookup_transform("world", "camera", 0).unwrap();
//!     let point_world = tf.transform_point([0.0, 0.0, 1.0]);
//!     println!("{:?}", point_world);
//! }
//! ```

pub use rct_core::{self, *};

/// The RCT prelude - everything you need to get started
pub mod prelude {
    // Transform data types
    pub use rct_core::transform::{Transform, TransformType};

    // Core and façades
    pub use rct_core::core::{TransformListener, TransformRequest, TransformerCore};
    pub use rct_core::publisher::TransformPublisher;
    pub use rct_core::receiver::TransformReceiver;

    // Wiring
    pub use rct_core::communication::{Envelope, LocalTransport, Transport};
    pub use rct_core::factory::{TransformerConfig, TransformerFactory};

    // Error types
    pub use rct_core::error::{RctError, RctResult};
    pub type Result<T> = RctResult<T>;

    // Common std types
    pub use std::sync::Arc;
    pub use std::time::{Duration, Instant};

    // Math types used in transform construction
    pub use nalgebra::{Isometry3, UnitQuaternion, Vector3};

    // Common traits
    pub use serde::{Deserialize, Serialize};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get RCT version
pub fn version() -> &'static str {
    VERSION
}
