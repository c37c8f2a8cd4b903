//! Transform math for positioning objects in 3D space.
//!
//! [`Transform`] describes position, rotation, and scale relative to a parent
//! (or to world origin for root objects). Global transforms are produced by
//! composing a parent's global transform with a child's local transform via
//! [`Transform::mul`].

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// A translation/rotation/scale transform.
///
/// # Example
///
/// ```
/// use marigold_core::Transform;
/// use glam::{Quat, Vec3};
///
/// let t = Transform::from_xyz(1.0, 2.0, 3.0)
///     .with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2))
///     .with_scale(Vec3::splat(2.0));
/// assert_eq!(t.translation, Vec3::new(1.0, 2.0, 3.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Position relative to the parent (or world origin without a parent).
    pub translation: Vec3,
    /// Rotation relative to the parent.
    pub rotation: Quat,
    /// Scale relative to the parent.
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    /// Identity transform: no translation, no rotation, uniform scale of 1.
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Creates a transform at the given position with default rotation and scale.
    #[inline]
    pub const fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self::from_translation(Vec3::new(x, y, z))
    }

    /// Creates a transform with the given translation.
    #[inline]
    pub const fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    /// Creates a transform with the given rotation.
    #[inline]
    pub const fn from_rotation(rotation: Quat) -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation,
            scale: Vec3::ONE,
        }
    }

    /// Creates a transform with the given scale.
    #[inline]
    pub const fn from_scale(scale: Vec3) -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale,
        }
    }

    /// Returns this transform with a different translation.
    #[inline]
    #[must_use]
    pub const fn with_translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    /// Returns this transform with a different rotation.
    #[inline]
    #[must_use]
    pub const fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Returns this transform with a different scale.
    #[inline]
    #[must_use]
    pub const fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Composes this transform with a child transform.
    ///
    /// If `self` is a parent's global transform and `child` is the child's
    /// local transform, the result is the child's global transform.
    #[inline]
    #[must_use]
    pub fn mul(&self, child: &Transform) -> Transform {
        Transform {
            translation: self.transform_point(child.translation),
            rotation: self.rotation * child.rotation,
            scale: self.scale * child.scale,
        }
    }

    /// Transforms a point from this transform's local space.
    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.translation + self.rotation * (self.scale * point)
    }

    /// Computes the 4x4 matrix for this transform.
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Returns whether the two transforms are equal within `epsilon` per channel.
    pub fn approx_eq(&self, other: &Transform, epsilon: f32) -> bool {
        self.translation.abs_diff_eq(other.translation, epsilon)
            && self.rotation.abs_diff_eq(other.rotation, epsilon)
            && self.scale.abs_diff_eq(other.scale, epsilon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn identity_is_default() {
        assert_eq!(Transform::default(), Transform::IDENTITY);
    }

    #[test]
    fn compose_translations() {
        let parent = Transform::from_xyz(1.0, 0.0, 0.0);
        let child = Transform::from_xyz(0.0, 2.0, 0.0);
        let global = parent.mul(&child);
        assert_eq!(global.translation, Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn compose_applies_parent_rotation() {
        let parent = Transform::from_rotation(Quat::from_rotation_z(FRAC_PI_2));
        let child = Transform::from_xyz(1.0, 0.0, 0.0);
        let global = parent.mul(&child);
        // Rotating +X by 90° around Z lands on +Y
        assert!(global.translation.abs_diff_eq(Vec3::new(0.0, 1.0, 0.0), 1e-6));
    }

    #[test]
    fn compose_applies_parent_scale() {
        let parent = Transform::from_scale(Vec3::splat(2.0));
        let child = Transform::from_xyz(1.0, 1.0, 1.0);
        let global = parent.mul(&child);
        assert_eq!(global.translation, Vec3::new(2.0, 2.0, 2.0));
        assert_eq!(global.scale, Vec3::splat(2.0));
    }

    #[test]
    fn compose_with_identity_is_noop() {
        let t = Transform::from_xyz(3.0, -1.0, 4.0)
            .with_rotation(Quat::from_rotation_y(0.7))
            .with_scale(Vec3::new(1.0, 2.0, 3.0));
        assert!(Transform::IDENTITY.mul(&t).approx_eq(&t, 1e-6));
        assert!(t.mul(&Transform::IDENTITY).approx_eq(&t, 1e-6));
    }

    #[test]
    fn matrix_matches_composition() {
        let parent = Transform::from_xyz(1.0, 2.0, 3.0)
            .with_rotation(Quat::from_rotation_x(0.3));
        let child = Transform::from_xyz(-1.0, 0.5, 2.0)
            .with_rotation(Quat::from_rotation_z(1.1));
        let composed = parent.mul(&child).to_matrix();
        let multiplied = parent.to_matrix() * child.to_matrix();
        assert!(composed.abs_diff_eq(multiplied, 1e-5));
    }

    #[test]
    fn transform_point_roundtrip() {
        let t = Transform::from_xyz(10.0, 0.0, 0.0)
            .with_rotation(Quat::from_rotation_y(FRAC_PI_2));
        let p = t.transform_point(Vec3::new(0.0, 0.0, -1.0));
        // -Z rotated by +90° around Y lands on -X, then translated
        assert!(p.abs_diff_eq(Vec3::new(9.0, 0.0, 0.0), 1e-6));
    }
}
