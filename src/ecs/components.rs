//! Common ECS components

use hecs::Entity;

use crate::math::TransformQvvs;

/// A component caching an entity's world-space transform.
///
/// Implemented by the continuous and the ticked caches so storage backends can
/// read and write either one through the same code.
pub trait WorldTransformComponent: hecs::Component + Copy {
    /// Wrap a transform.
    fn from_transform(transform: TransformQvvs) -> Self;

    /// Get the cached transform.
    fn transform(&self) -> TransformQvvs;

    /// Overwrite the cached transform.
    fn set_transform(&mut self, transform: TransformQvvs);
}

/// World-space transform, updated whenever a write occurs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorldTransform(pub TransformQvvs);

impl WorldTransformComponent for WorldTransform {
    fn from_transform(transform: TransformQvvs) -> Self {
        Self(transform)
    }

    fn transform(&self) -> TransformQvvs {
        self.0
    }

    fn set_transform(&mut self, transform: TransformQvvs) {
        self.0 = transform;
    }
}

/// World-space transform snapshot for fixed-interval consumers.
///
/// Propagated independently from [`WorldTransform`]; the two never read each other.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickedWorldTransform(pub TransformQvvs);

impl WorldTransformComponent for TickedWorldTransform {
    fn from_transform(transform: TransformQvvs) -> Self {
        Self(transform)
    }

    fn transform(&self) -> TransformQvvs {
        self.0
    }

    fn set_transform(&mut self, transform: TransformQvvs) {
        self.0 = transform;
    }
}

/// Back-pointer from a non-root hierarchy member to the root owning its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootReference {
    /// Root entity owning the hierarchy buffer
    pub root: Entity,
    /// Index of this entity in the root's buffer
    pub index: u32,
}

impl RootReference {
    /// Create a new root reference
    #[must_use]
    pub const fn new(root: Entity, index: u32) -> Self {
        Self { root, index }
    }

    /// Index as `usize`
    #[must_use]
    #[inline]
    pub const fn index(&self) -> usize {
        self.index as usize
    }
}

/// Name component for debugging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_world_transform_component_roundtrip() {
        let t = TransformQvvs::from_translation(Vec3::new(1.0, 2.0, 3.0));

        let mut continuous = WorldTransform::from_transform(TransformQvvs::IDENTITY);
        continuous.set_transform(t);
        assert_eq!(continuous.transform(), t);

        let ticked = TickedWorldTransform::from_transform(t);
        assert_eq!(ticked.0, t);
    }

    #[test]
    fn test_root_reference_index() {
        let mut world = hecs::World::new();
        let root = world.spawn(());

        let reference = RootReference::new(root, 7);
        assert_eq!(reference.index(), 7);
        assert_eq!(reference.root, root);
    }
}
