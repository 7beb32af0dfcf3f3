//! QVVS transform value
//!
//! A transform made of a translation, a unit quaternion rotation, a uniform
//! scale and a per-axis stretch. Scale and stretch are kept apart: scale is a
//! single factor that compounds through the hierarchy, stretch is applied after
//! rotation along the local axes.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Translation, rotation, uniform scale and stretch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformQvvs {
    /// Translation
    pub translation: Vec3,
    /// Rotation, expected to be normalized
    pub rotation: Quat,
    /// Uniform scale factor
    pub scale: f32,
    /// Per-axis stretch, independent of `scale`
    pub stretch: Vec3,
}

impl TransformQvvs {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: 1.0,
        stretch: Vec3::ONE,
    };

    /// Create a transform from all four parts.
    #[must_use]
    pub const fn new(translation: Vec3, rotation: Quat, scale: f32, stretch: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
            stretch,
        }
    }

    /// Create a transform with just a translation.
    #[must_use]
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Create a transform with just a rotation.
    #[must_use]
    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    /// Create a transform from translation and rotation.
    #[must_use]
    pub fn from_translation_rotation(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
            ..Self::IDENTITY
        }
    }

    /// Replace the uniform scale.
    #[must_use]
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Replace the stretch.
    #[must_use]
    pub fn with_stretch(mut self, stretch: Vec3) -> Self {
        self.stretch = stretch;
        self
    }

    /// Express `child` in the space of `self`.
    ///
    /// The child's translation is scaled by the parent's scale and stretch,
    /// rotated by the parent's rotation and offset by the parent's translation.
    /// Rotations, scales and stretches multiply.
    #[must_use]
    #[inline]
    pub fn compose(&self, child: &Self) -> Self {
        let rotation = self.rotation.normalize();
        Self {
            translation: self.translation
                + rotation * (child.translation * self.stretch * self.scale),
            rotation: (rotation * child.rotation).normalize(),
            scale: self.scale * child.scale,
            stretch: self.stretch * child.stretch,
        }
    }

    /// Recover the transform that, composed under `parent`, yields `self`.
    ///
    /// Returns `None` if the parent's scale or any stretch component is too
    /// close to zero to invert.
    #[must_use]
    pub fn relative_to(&self, parent: &Self) -> Option<Self> {
        let stretch_min = parent.stretch.abs().min_element();
        if parent.scale.abs() <= f32::EPSILON || stretch_min <= f32::EPSILON {
            return None;
        }

        let inverse_rotation = parent.rotation.normalize().inverse();
        let offset = inverse_rotation * (self.translation - parent.translation);
        Some(Self {
            translation: offset / (parent.stretch * parent.scale),
            rotation: (inverse_rotation * self.rotation).normalize(),
            scale: self.scale / parent.scale,
            stretch: self.stretch / parent.stretch,
        })
    }

    /// Transform a direction. Not affected by scale, stretch or translation.
    #[must_use]
    #[inline]
    pub fn transform_direction(&self, direction: Vec3) -> Vec3 {
        self.rotation.normalize() * direction
    }

    /// Transform a point from local space into this transform's space.
    #[must_use]
    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.translation + self.rotation.normalize() * (point * self.stretch * self.scale)
    }

    /// Returns the matrix representation (M = T * R * S).
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.stretch * self.scale,
            self.rotation.normalize(),
            self.translation,
        )
    }

    /// Compare component-wise within `max_abs_diff`.
    #[must_use]
    pub fn abs_diff_eq(&self, other: &Self, max_abs_diff: f32) -> bool {
        self.translation.abs_diff_eq(other.translation, max_abs_diff)
            && (self.rotation.abs_diff_eq(other.rotation, max_abs_diff)
                || self.rotation.abs_diff_eq(-other.rotation, max_abs_diff))
            && (self.scale - other.scale).abs() <= max_abs_diff
            && self.stretch.abs_diff_eq(other.stretch, max_abs_diff)
    }
}

impl Default for TransformQvvs {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::ops::Mul for TransformQvvs {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.compose(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_identity_compose() {
        let t = TransformQvvs::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_y(0.3),
            2.0,
            Vec3::new(1.0, 0.5, 2.0),
        );

        assert!((TransformQvvs::IDENTITY * t).abs_diff_eq(&t, 1e-6));
        assert!((t * TransformQvvs::IDENTITY).abs_diff_eq(&t, 1e-6));
    }

    #[test]
    fn test_compose_rotates_translation() {
        let parent = TransformQvvs::from_rotation(Quat::from_rotation_y(FRAC_PI_2));
        let child = TransformQvvs::from_translation(Vec3::new(0.0, 0.0, 1.0));

        let world = parent * child;
        assert!(world.translation.abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn test_compose_scale_and_stretch() {
        let parent = TransformQvvs::from_translation(Vec3::new(1.0, 0.0, 0.0))
            .with_scale(2.0)
            .with_stretch(Vec3::new(1.0, 3.0, 1.0));
        let child = TransformQvvs::from_translation(Vec3::new(1.0, 1.0, 0.0))
            .with_scale(0.5)
            .with_stretch(Vec3::new(2.0, 1.0, 1.0));

        let world = parent * child;
        assert!(world.translation.abs_diff_eq(Vec3::new(3.0, 6.0, 0.0), 1e-6));
        assert!((world.scale - 1.0).abs() < 1e-6);
        assert!(world.stretch.abs_diff_eq(Vec3::new(2.0, 3.0, 1.0), 1e-6));
    }

    #[test]
    fn test_relative_to_inverts_compose() {
        let parent = TransformQvvs::new(
            Vec3::new(4.0, -1.0, 2.0),
            Quat::from_rotation_x(0.7),
            1.5,
            Vec3::new(2.0, 1.0, 0.5),
        );
        let local = TransformQvvs::new(
            Vec3::new(0.5, 1.0, -3.0),
            Quat::from_rotation_z(-0.4),
            0.25,
            Vec3::new(1.0, 4.0, 1.0),
        );

        let world = parent * local;
        let recovered = world.relative_to(&parent).unwrap();
        assert!(recovered.abs_diff_eq(&local, 1e-4));
    }

    #[test]
    fn test_relative_to_degenerate_parent() {
        let flat = TransformQvvs::IDENTITY.with_stretch(Vec3::new(1.0, 0.0, 1.0));
        assert!(TransformQvvs::IDENTITY.relative_to(&flat).is_none());

        let collapsed = TransformQvvs::IDENTITY.with_scale(0.0);
        assert!(TransformQvvs::IDENTITY.relative_to(&collapsed).is_none());
    }

    #[test]
    fn test_transform_point_matches_matrix() {
        let t = TransformQvvs::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_z(FRAC_PI_2),
            2.0,
            Vec3::new(1.0, 2.0, 1.0),
        );
        let p = Vec3::new(1.0, 1.0, 0.0);

        let direct = t.transform_point(p);
        let via_matrix = t.matrix().transform_point3(p);
        assert!(direct.abs_diff_eq(via_matrix, 1e-5));
        assert!(direct.abs_diff_eq(Vec3::new(-3.0, 4.0, 3.0), 1e-5));
    }

    #[test]
    fn test_serde_defaults_missing_fields() {
        let t: TransformQvvs = ron::from_str("(translation: (1.0, 2.0, 3.0))").unwrap();
        assert_eq!(t.translation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.scale, 1.0);
        assert_eq!(t.stretch, Vec3::ONE);
    }
}
