//! Math type re-exports and the small geometric types the converter shares.
//!
//! This module re-exports types from `glam` and provides a double precision
//! bounding box and a translate/orient/scale transform matching the xform op
//! stack authored on every node.

pub use glam::{DAffine3, DMat3, DMat4, DQuat, DVec2, DVec3, DVec4, Vec2, Vec3};

use std::fmt;

/// 3D bounding box with double precision.
#[derive(Clone, Copy, PartialEq)]
pub struct BBox3d {
    pub min: DVec3,
    pub max: DVec3,
}

impl BBox3d {
    /// Empty bounding box (inverted, will expand on first point).
    pub const EMPTY: Self = Self {
        min: DVec3::splat(f64::INFINITY),
        max: DVec3::splat(f64::NEG_INFINITY),
    };

    /// Create a new bounding box from min and max points.
    #[inline]
    pub const fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Box centered on the origin with the given half extents.
    #[inline]
    pub fn symmetric(half: DVec3) -> Self {
        Self { min: -half, max: half }
    }

    /// Check if this box is empty (has no volume).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this box to include a point.
    #[inline]
    pub fn expand_by_point(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Expand this box to include another box.
    #[inline]
    pub fn expand_by_box(&mut self, other: &Self) {
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    /// Get the center of the box.
    #[inline]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the size of the box.
    #[inline]
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// The eight corners, min corner first.
    pub fn corners(&self) -> [DVec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            DVec3::new(a.x, a.y, a.z),
            DVec3::new(b.x, a.y, a.z),
            DVec3::new(a.x, b.y, a.z),
            DVec3::new(b.x, b.y, a.z),
            DVec3::new(a.x, a.y, b.z),
            DVec3::new(b.x, a.y, b.z),
            DVec3::new(a.x, b.y, b.z),
            DVec3::new(b.x, b.y, b.z),
        ]
    }

    /// Axis aligned bound of this box after an affine transform.
    pub fn transformed(&self, xf: &DAffine3) -> Self {
        if self.is_empty() {
            return *self;
        }
        let mut out = Self::EMPTY;
        for c in self.corners() {
            out.expand_by_point(xf.transform_point3(c));
        }
        out
    }

    /// Convert to the single precision pair authored as `extent`.
    pub fn as_f32(&self) -> [[f32; 3]; 2] {
        [self.min.as_vec3().to_array(), self.max.as_vec3().to_array()]
    }
}

impl Default for BBox3d {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for BBox3d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BBox3d({:?} - {:?})", self.min, self.max)
    }
}

/// Translate, orient, scale. Rotation and translation compose as a rigid
/// frame; scale is carried per component.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: DVec3,
    pub rotation: DQuat,
    pub scale: DVec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
        scale: DVec3::ONE,
    };

    /// Rigid transform with unit scale.
    #[inline]
    pub fn new(translation: DVec3, rotation: DQuat) -> Self {
        Self { translation, rotation, scale: DVec3::ONE }
    }

    #[inline]
    pub fn with_scale(mut self, scale: DVec3) -> Self {
        self.scale = scale;
        self
    }

    /// Full affine matrix (scale, then rotate, then translate).
    pub fn to_affine(&self) -> DAffine3 {
        DAffine3::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Rigid composition `self * other`, ignoring scale.
    pub fn mul_rigid(&self, other: &Self) -> Self {
        Self::new(
            self.translation + self.rotation * other.translation,
            (self.rotation * other.rotation).normalize(),
        )
    }

    /// Rigid inverse, ignoring scale.
    pub fn inverse_rigid(&self) -> Self {
        let inv = self.rotation.inverse();
        Self::new(-(inv * self.translation), inv)
    }

    /// Apply the rigid part to a point.
    #[inline]
    pub fn transform_point(&self, p: DVec3) -> DVec3 {
        self.translation + self.rotation * p
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
