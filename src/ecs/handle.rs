//! Resolving entities to hierarchy slots

use hecs::Entity;

use super::components::RootReference;

/// Which buffer a handle was resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferSource {
    /// The buffer stored on a live root
    Live,
    /// The cleanup record of a despawned root
    Cleanup,
}

/// An entity's slot within a hierarchy buffer.
///
/// Entities that belong to no hierarchy resolve to no handle at all, see [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HierarchyHandle {
    root: Entity,
    index: usize,
    source: BufferSource,
}

impl HierarchyHandle {
    /// Create a handle.
    #[must_use]
    pub const fn new(root: Entity, index: usize, source: BufferSource) -> Self {
        Self {
            root,
            index,
            source,
        }
    }

    /// Root entity owning the buffer.
    #[must_use]
    #[inline]
    pub const fn root(&self) -> Entity {
        self.root
    }

    /// Slot index in the buffer.
    #[must_use]
    #[inline]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Buffer the slot lives in.
    #[must_use]
    #[inline]
    pub const fn source(&self) -> BufferSource {
        self.source
    }

    /// Whether the handle points at the root slot.
    #[must_use]
    #[inline]
    pub const fn is_root(&self) -> bool {
        self.index == 0
    }
}

/// Storage that can answer the lookups handle resolution needs.
pub trait HierarchyLookup {
    /// The entity's root reference, if it is a non-root hierarchy member.
    fn root_reference(&self, entity: Entity) -> Option<RootReference>;

    /// Whether `root` carries a live hierarchy buffer.
    fn has_hierarchy(&self, root: Entity) -> bool;

    /// Whether a cleanup record for `root` is still pending.
    fn has_cleanup(&self, root: Entity) -> bool;
}

/// Resolve an entity to its hierarchy slot.
///
/// Returns `None` for entities with no hierarchy bookkeeping, which is the common
/// case for standalone entities. A member whose root has been despawned resolves
/// against the cleanup record while it lasts. Never mutates anything.
pub fn resolve<L>(entity: Entity, lookup: &L) -> Option<HierarchyHandle>
where
    L: HierarchyLookup + ?Sized,
{
    if let Some(reference) = lookup.root_reference(entity) {
        let source = if lookup.has_hierarchy(reference.root) {
            BufferSource::Live
        } else if lookup.has_cleanup(reference.root) {
            BufferSource::Cleanup
        } else {
            log::warn!(
                "{:?} references root {:?} which has no hierarchy buffer",
                entity,
                reference.root
            );
            return None;
        };
        return Some(HierarchyHandle::new(
            reference.root,
            reference.index(),
            source,
        ));
    }

    if lookup.has_hierarchy(entity) {
        return Some(HierarchyHandle::new(entity, 0, BufferSource::Live));
    }

    None
}
