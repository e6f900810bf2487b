//! Rigid-body transform between two named coordinate frames.
//!
//! A [`Transform`] is a timestamped snapshot of the pose of a child frame
//! expressed in its parent frame: the rotation/translation pair maps points
//! given in child coordinates into parent coordinates. Transforms compose,
//! invert and interpolate (slerp for rotation, linear for translation).

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a transform is constant over time or a time-series sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformType {
    /// Assumed constant; cached as a single value, deduplicated by value
    Static,
    /// Time-varying; buffered as an ordered sample series per edge
    Dynamic,
}

/// A rigid transform relating a child frame to its parent frame at an instant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transform {
    /// Parent frame name
    pub parent_frame: String,
    /// Child frame name
    pub child_frame: String,
    /// Rotation of the child frame in the parent frame
    pub rotation: UnitQuaternion<f64>,
    /// Translation of the child frame origin in the parent frame
    pub translation: Vector3<f64>,
    /// Timestamp in milliseconds since the epoch
    pub time: u64,
    /// Identity of the process/component that produced this transform
    pub authority: String,
}

impl Transform {
    /// Create a new transform
    pub fn new(
        parent_frame: impl Into<String>,
        child_frame: impl Into<String>,
        rotation: UnitQuaternion<f64>,
        translation: Vector3<f64>,
        time: u64,
        authority: impl Into<String>,
    ) -> Self {
        Self {
            parent_frame: parent_frame.into(),
            child_frame: child_frame.into(),
            rotation,
            translation,
            time,
            authority: authority.into(),
        }
    }

    /// Create a transform from raw quaternion components (normalized on entry)
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        parent_frame: impl Into<String>,
        child_frame: impl Into<String>,
        qw: f64,
        qx: f64,
        qy: f64,
        qz: f64,
        translation: [f64; 3],
        time: u64,
        authority: impl Into<String>,
    ) -> Self {
        Self::new(
            parent_frame,
            child_frame,
            UnitQuaternion::from_quaternion(Quaternion::new(qw, qx, qy, qz)),
            Vector3::new(translation[0], translation[1], translation[2]),
            time,
            authority,
        )
    }

    /// Identity transform between two frames
    pub fn identity(
        parent_frame: impl Into<String>,
        child_frame: impl Into<String>,
        time: u64,
    ) -> Self {
        Self::new(
            parent_frame,
            child_frame,
            UnitQuaternion::identity(),
            Vector3::zeros(),
            time,
            "",
        )
    }

    /// View this transform as an isometry mapping child coordinates to
    /// parent coordinates
    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.translation), self.rotation)
    }

    /// Build a transform from an isometry and frame metadata
    pub fn from_isometry(
        parent_frame: impl Into<String>,
        child_frame: impl Into<String>,
        iso: &Isometry3<f64>,
        time: u64,
        authority: impl Into<String>,
    ) -> Self {
        Self::new(
            parent_frame,
            child_frame,
            iso.rotation,
            iso.translation.vector,
            time,
            authority,
        )
    }

    /// Invert: the same pose seen from the child frame, frames swapped
    pub fn inverse(&self) -> Self {
        let inv = self.isometry().inverse();
        Self::from_isometry(
            self.child_frame.clone(),
            self.parent_frame.clone(),
            &inv,
            self.time,
            self.authority.clone(),
        )
    }

    /// Compose with another transform whose parent is this child
    ///
    /// The result maps `other.child_frame` coordinates into
    /// `self.parent_frame` coordinates.
    pub fn compose(&self, other: &Transform) -> Self {
        let iso = self.isometry() * other.isometry();
        Self::from_isometry(
            self.parent_frame.clone(),
            other.child_frame.clone(),
            &iso,
            self.time.max(other.time),
            self.authority.clone(),
        )
    }

    /// Interpolate between this transform and another at `alpha` in [0, 1]
    ///
    /// Rotation is slerped, translation linearly interpolated. Frame names
    /// and authority are taken from `self`; the timestamp is interpolated.
    pub fn interpolate(&self, other: &Transform, alpha: f64) -> Self {
        let alpha = alpha.clamp(0.0, 1.0);
        // Antipodal quaternions have no unique slerp path; fall back to the
        // nearer endpoint in that degenerate case.
        let rotation = self
            .rotation
            .try_slerp(&other.rotation, alpha, 1.0e-9)
            .unwrap_or(if alpha < 0.5 {
                self.rotation
            } else {
                other.rotation
            });
        let translation = self.translation.lerp(&other.translation, alpha);
        let time = self.time as f64 + (other.time as f64 - self.time as f64) * alpha;
        Self::new(
            self.parent_frame.clone(),
            self.child_frame.clone(),
            rotation,
            translation,
            time.round() as u64,
            self.authority.clone(),
        )
    }

    /// Apply this transform to a point given in child-frame coordinates
    pub fn transform_point(&self, point: [f64; 3]) -> [f64; 3] {
        let p = self.isometry() * nalgebra::Point3::new(point[0], point[1], point[2]);
        [p.x, p.y, p.z]
    }

    /// Apply only the rotation to a direction vector
    pub fn transform_vector(&self, vector: [f64; 3]) -> [f64; 3] {
        let v = self.rotation * Vector3::new(vector[0], vector[1], vector[2]);
        [v.x, v.y, v.z]
    }

    /// Value equality ignoring the timestamp
    ///
    /// Used to detect no-op re-publication of static transforms.
    pub fn equals_without_time(&self, other: &Transform) -> bool {
        self.parent_frame == other.parent_frame
            && self.child_frame == other.child_frame
            && self.rotation.coords == other.rotation.coords
            && self.translation == other.translation
    }

    /// Whether this is (approximately) the identity transform
    pub fn is_identity(&self, eps: f64) -> bool {
        self.translation.norm() <= eps && self.rotation.angle() <= eps
    }
}

// Equality covers frame pair, transform values and time; authority is
// attribution metadata and does not participate.
impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.equals_without_time(other)
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (roll, pitch, yaw) = self.rotation.euler_angles();
        write!(
            f,
            "{} -> {} @ {} ms: t=({:.3}, {:.3}, {:.3}) rpy=({:.3}, {:.3}, {:.3}) [{}]",
            self.parent_frame,
            self.child_frame,
            self.time,
            self.translation.x,
            self.translation.y,
            self.translation.z,
            roll,
            pitch,
            yaw,
            self.authority,
        )
    }
}
