//! Bounding volumes for spatial data aggregation.
//!
//! [`BoundingVolume`] stores a box and a sphere around a shared center, the
//! representation used when components contribute local bounds to their
//! owning object. The box part serves tight culling tests, the sphere part
//! coarse rejection tests; both are kept in sync through all operations.

use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

use crate::math::Transform;

/// A combined box + sphere bounding volume.
///
/// An invalid volume (see [`BoundingVolume::invalid`]) acts as the identity
/// for [`expand_to_include`](BoundingVolume::expand_to_include), so
/// accumulation loops can start from it without special-casing the first
/// contribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingVolume {
    /// Shared center of box and sphere.
    pub center: Vec3,
    /// Half extents of the box part.
    pub half_extents: Vec3,
    /// Radius of the sphere part.
    pub sphere_radius: f32,
}

impl BoundingVolume {
    /// Creates an invalid (empty) volume. Expanding it by a valid volume
    /// yields that volume unchanged.
    pub const fn invalid() -> Self {
        Self {
            center: Vec3::ZERO,
            half_extents: Vec3::splat(-1.0),
            sphere_radius: -1.0,
        }
    }

    /// Creates a volume from a box center and half extents. The sphere part
    /// circumscribes the box.
    pub fn from_box(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents,
            sphere_radius: half_extents.length(),
        }
    }

    /// Creates a volume from a sphere. The box part circumscribes the sphere.
    pub fn from_sphere(center: Vec3, radius: f32) -> Self {
        Self {
            center,
            half_extents: Vec3::splat(radius),
            sphere_radius: radius,
        }
    }

    /// Creates a zero-size volume at a point.
    pub fn from_point(point: Vec3) -> Self {
        Self {
            center: point,
            half_extents: Vec3::ZERO,
            sphere_radius: 0.0,
        }
    }

    /// Returns whether this volume holds valid extents.
    pub fn is_valid(&self) -> bool {
        self.sphere_radius >= 0.0
            && self.half_extents.x >= 0.0
            && self.half_extents.y >= 0.0
            && self.half_extents.z >= 0.0
    }

    /// Expands this volume to include `other`.
    ///
    /// Invalid inputs are ignored; expanding an invalid volume replaces it.
    pub fn expand_to_include(&mut self, other: &BoundingVolume) {
        if !other.is_valid() {
            return;
        }
        if !self.is_valid() {
            *self = *other;
            return;
        }

        let min = (self.center - self.half_extents).min(other.center - other.half_extents);
        let max = (self.center + self.half_extents).max(other.center + other.half_extents);
        let center = (min + max) * 0.5;
        let half_extents = (max - min) * 0.5;

        // The merged sphere must cover both input spheres from the new center,
        // but never needs to exceed the merged box's circumscribed sphere.
        let radius = ((self.center - center).length() + self.sphere_radius)
            .max((other.center - center).length() + other.sphere_radius)
            .min(half_extents.length());

        *self = Self {
            center,
            half_extents,
            sphere_radius: radius,
        };
    }

    /// Returns this volume transformed into another space.
    ///
    /// The box part is re-axis-aligned conservatively; the sphere radius is
    /// scaled by the largest scale channel.
    #[must_use]
    pub fn transformed(&self, transform: &Transform) -> BoundingVolume {
        if !self.is_valid() {
            return *self;
        }

        let center = transform.transform_point(self.center);
        let scaled = self.half_extents * transform.scale.abs();

        // Conservative AABB of a rotated box: multiply extents by the
        // element-wise absolute rotation matrix.
        let rot = Mat3::from_quat(transform.rotation);
        let half_extents = Vec3::new(
            rot.x_axis.x.abs() * scaled.x + rot.y_axis.x.abs() * scaled.y + rot.z_axis.x.abs() * scaled.z,
            rot.x_axis.y.abs() * scaled.x + rot.y_axis.y.abs() * scaled.y + rot.z_axis.y.abs() * scaled.z,
            rot.x_axis.z.abs() * scaled.x + rot.y_axis.z.abs() * scaled.y + rot.z_axis.z.abs() * scaled.z,
        );

        let max_scale = transform
            .scale
            .x
            .abs()
            .max(transform.scale.y.abs())
            .max(transform.scale.z.abs());

        BoundingVolume {
            center,
            half_extents,
            sphere_radius: self.sphere_radius * max_scale,
        }
    }

    /// Returns whether this volume's box overlaps a sphere.
    pub fn overlaps_sphere(&self, center: Vec3, radius: f32) -> bool {
        if !self.is_valid() {
            return false;
        }
        let min = self.center - self.half_extents;
        let max = self.center + self.half_extents;
        let closest = center.clamp(min, max);
        (closest - center).length_squared() <= radius * radius
    }

    /// Returns whether a point lies inside this volume's box.
    pub fn contains_point(&self, point: Vec3) -> bool {
        if !self.is_valid() {
            return false;
        }
        let d = (point - self.center).abs();
        d.x <= self.half_extents.x && d.y <= self.half_extents.y && d.z <= self.half_extents.z
    }
}

impl Default for BoundingVolume {
    fn default() -> Self {
        Self::invalid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn invalid_by_default() {
        assert!(!BoundingVolume::default().is_valid());
        assert!(BoundingVolume::from_point(Vec3::ZERO).is_valid());
    }

    #[test]
    fn expand_invalid_takes_other() {
        let mut v = BoundingVolume::invalid();
        let other = BoundingVolume::from_box(Vec3::ONE, Vec3::splat(0.5));
        v.expand_to_include(&other);
        assert_eq!(v, other);
    }

    #[test]
    fn expand_ignores_invalid_other() {
        let mut v = BoundingVolume::from_sphere(Vec3::ZERO, 1.0);
        let before = v;
        v.expand_to_include(&BoundingVolume::invalid());
        assert_eq!(v, before);
    }

    #[test]
    fn expand_covers_both_boxes() {
        let mut v = BoundingVolume::from_box(Vec3::new(-2.0, 0.0, 0.0), Vec3::ONE);
        v.expand_to_include(&BoundingVolume::from_box(Vec3::new(2.0, 0.0, 0.0), Vec3::ONE));

        assert_eq!(v.center, Vec3::ZERO);
        assert_eq!(v.half_extents, Vec3::new(3.0, 1.0, 1.0));
        assert!(v.contains_point(Vec3::new(-3.0, 0.9, 0.0)));
        assert!(v.contains_point(Vec3::new(3.0, -0.9, 0.0)));
        assert!(!v.contains_point(Vec3::new(3.1, 0.0, 0.0)));
    }

    #[test]
    fn expand_sphere_covers_inputs() {
        let a = BoundingVolume::from_sphere(Vec3::new(-1.0, 0.0, 0.0), 1.0);
        let b = BoundingVolume::from_sphere(Vec3::new(3.0, 0.0, 0.0), 0.5);
        let mut v = a;
        v.expand_to_include(&b);

        // Both input spheres' farthest points fit in the merged sphere.
        assert!((Vec3::new(-2.0, 0.0, 0.0) - v.center).length() <= v.sphere_radius + 1e-6);
        assert!((Vec3::new(3.5, 0.0, 0.0) - v.center).length() <= v.sphere_radius + 1e-6);
    }

    #[test]
    fn transformed_translates_center() {
        let v = BoundingVolume::from_box(Vec3::ZERO, Vec3::ONE);
        let t = Transform::from_xyz(5.0, 0.0, 0.0);
        let out = v.transformed(&t);
        assert_eq!(out.center, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(out.half_extents, Vec3::ONE);
    }

    #[test]
    fn transformed_scales_radius_by_max_channel() {
        let v = BoundingVolume::from_sphere(Vec3::ZERO, 2.0);
        let t = Transform::from_scale(Vec3::new(1.0, 3.0, 2.0));
        let out = v.transformed(&t);
        assert!((out.sphere_radius - 6.0).abs() < 1e-6);
    }

    #[test]
    fn transformed_rotation_stays_conservative() {
        let v = BoundingVolume::from_box(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        let t = Transform::from_rotation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_4));
        let out = v.transformed(&t);
        // Corner of the rotated segment must still be inside
        let corner = Vec3::new(std::f32::consts::FRAC_1_SQRT_2, std::f32::consts::FRAC_1_SQRT_2, 0.0);
        assert!(out.contains_point(corner));
    }

    #[test]
    fn overlaps_sphere_tests_box_distance() {
        let v = BoundingVolume::from_box(Vec3::ZERO, Vec3::ONE);
        assert!(v.overlaps_sphere(Vec3::new(1.5, 0.0, 0.0), 0.6));
        assert!(!v.overlaps_sphere(Vec3::new(1.5, 0.0, 0.0), 0.4));
        assert!(v.overlaps_sphere(Vec3::ZERO, 0.1));
    }
}
