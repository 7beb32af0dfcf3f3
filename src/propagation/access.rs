//! Capabilities a storage backend provides to the propagation engine

use hecs::Entity;

use super::channel::TransformChannel;
use crate::math::TransformQvvs;

/// Read and write access to one channel's cached world transforms.
pub trait WorldTransformAccess<C: TransformChannel> {
    /// Current world transform, `None` if the entity has no such component.
    fn read(&self, entity: Entity) -> Option<TransformQvvs>;

    /// Store a world transform. Entities lacking the component are skipped.
    fn write(&mut self, entity: Entity, transform: TransformQvvs);
}

/// Whether an entity still exists.
///
/// Used to skip buffer slots whose entity was destroyed but has not been
/// compacted out yet.
pub trait Liveness {
    /// Check if the entity is alive.
    fn is_alive(&self, entity: Entity) -> bool;
}

impl Liveness for hecs::World {
    #[inline]
    fn is_alive(&self, entity: Entity) -> bool {
        self.contains(entity)
    }
}
