//! World wrapper around hecs
//!
//! Adds hierarchy bookkeeping on top of the raw store: installing flattened
//! hierarchies, retiring a despawned root's buffer into a cleanup record, and
//! the end-of-frame pass that ages those records and compacts dead slots.
//! Transform writes live with the backends in [`crate::propagation`].

use hecs::Entity;
use rustc_hash::FxHashMap;

use super::components::{RootReference, TickedWorldTransform, WorldTransform};
use super::handle::{HierarchyHandle, HierarchyLookup, resolve};
use super::hierarchy::{CleanupBuffer, HierarchyBuffer};
use crate::core::{HierarchyError, PropagationConfig, PropagationStats};

/// Game world containing all entities and components
pub struct World {
    /// The underlying hecs world
    pub inner: hecs::World,
    /// Retired buffers of despawned roots, keyed by the dead root
    pub(crate) cleanup: FxHashMap<Entity, CleanupBuffer>,
    pub(crate) config: PropagationConfig,
    pub(crate) stats: PropagationStats,
}

/// What [`World::end_frame`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameMaintenance {
    /// Cleanup records dropped
    pub expired: usize,
    /// Members detached into standalone entities by expired records
    pub detached: usize,
    /// Live buffers that had dead slots removed
    pub compacted: usize,
    /// Dead slots removed
    pub removed_slots: usize,
}

impl World {
    /// Create a new empty world
    pub fn new() -> Self {
        Self::with_config(PropagationConfig::default())
    }

    /// Create a new empty world with the given configuration
    pub fn with_config(config: PropagationConfig) -> Self {
        Self {
            inner: hecs::World::new(),
            cleanup: FxHashMap::default(),
            config,
            stats: PropagationStats::new(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &PropagationConfig {
        &self.config
    }

    /// Get accumulated propagation statistics
    pub fn stats(&self) -> &PropagationStats {
        &self.stats
    }

    /// Get accumulated propagation statistics (mutable)
    pub fn stats_mut(&mut self) -> &mut PropagationStats {
        &mut self.stats
    }

    /// Spawn an entity with the given components
    pub fn spawn(&mut self, components: impl hecs::DynamicBundle) -> Entity {
        self.inner.spawn(components)
    }

    /// Despawn an entity
    ///
    /// A hierarchy root's buffer is retired into a cleanup record so writes
    /// through its members keep resolving for `cleanup_frames` frames.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), hecs::NoSuchEntity> {
        if let Ok(buffer) = self.inner.remove_one::<HierarchyBuffer>(entity) {
            if self.config.cleanup_frames > 0 {
                log::debug!(
                    "retiring hierarchy of {:?} ({} slots) for {} frames",
                    entity,
                    buffer.len(),
                    self.config.cleanup_frames
                );
                self.cleanup
                    .insert(entity, CleanupBuffer::new(buffer, self.config.cleanup_frames));
            } else {
                detach_members(&mut self.inner, &buffer);
            }
        }
        self.inner.despawn(entity)
    }

    /// Get a reference to a component
    pub fn get<T: hecs::Component>(
        &self,
        entity: Entity,
    ) -> Result<hecs::Ref<'_, T>, hecs::ComponentError> {
        self.inner.get::<&T>(entity)
    }

    /// Get a mutable reference to a component
    pub fn get_mut<T: hecs::Component>(
        &mut self,
        entity: Entity,
    ) -> Result<hecs::RefMut<'_, T>, hecs::ComponentError> {
        self.inner.get::<&mut T>(entity)
    }

    /// Check if an entity exists
    pub fn contains(&self, entity: Entity) -> bool {
        self.inner.contains(entity)
    }

    /// Get the number of entities
    pub fn len(&self) -> u32 {
        self.inner.len()
    }

    /// Check if the world is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Clear all entities and cleanup records
    pub fn clear(&mut self) {
        self.inner.clear();
        self.cleanup.clear();
    }

    /// Query for entities with specific components
    pub fn query<Q: hecs::Query>(&self) -> hecs::QueryBorrow<'_, Q> {
        self.inner.query::<Q>()
    }

    /// Query for entities with specific components (mutable)
    pub fn query_mut<Q: hecs::Query>(&mut self) -> hecs::QueryMut<'_, Q> {
        self.inner.query_mut::<Q>()
    }

    // ========================================================================
    // Hierarchies
    // ========================================================================

    /// Install a hierarchy buffer on its root.
    ///
    /// Every member gets its cached world transforms from the buffer and each
    /// non-root member gets a [`RootReference`]. Replacing a root's existing
    /// hierarchy detaches members that are not part of the new one.
    ///
    /// # Errors
    ///
    /// Fails if the buffer is malformed, a member does not exist, or a member
    /// already belongs to another hierarchy.
    pub fn insert_hierarchy(&mut self, buffer: HierarchyBuffer) -> Result<(), HierarchyError> {
        buffer.validate()?;

        let root = buffer.root();
        for node in buffer.nodes() {
            let entity = node.entity();
            if !self.inner.contains(entity) {
                return Err(HierarchyError::MissingEntity(entity));
            }
            let owner = self.root_reference(entity).map(|r| r.root);
            let owns_other = entity != root && self.has_hierarchy(entity);
            if owner.is_some_and(|owner| owner != root) || owns_other {
                return Err(HierarchyError::DuplicateEntity(entity));
            }
        }

        if let Ok(previous) = self.inner.remove_one::<HierarchyBuffer>(root) {
            let kept = previous
                .nodes()
                .iter()
                .filter(|node| buffer.index_of(node.entity()).is_none());
            for node in kept {
                let _ = self.inner.remove_one::<RootReference>(node.entity());
            }
        }

        for node in buffer.nodes() {
            let entity = node.entity();
            self.inner
                .insert_one(entity, WorldTransform(node.continuous().world))
                .map_err(|_| HierarchyError::MissingEntity(entity))?;
            if self.config.track_ticked {
                self.inner
                    .insert_one(entity, TickedWorldTransform(node.ticked().world))
                    .map_err(|_| HierarchyError::MissingEntity(entity))?;
            }
            if node.parent_index().is_some() {
                self.inner
                    .insert_one(entity, RootReference::new(root, node.index() as u32))
                    .map_err(|_| HierarchyError::MissingEntity(entity))?;
            }
        }

        log::debug!("installed hierarchy of {:?} with {} slots", root, buffer.len());
        self.inner
            .insert_one(root, buffer)
            .map_err(|_| HierarchyError::MissingEntity(root))
    }

    /// Get the live hierarchy buffer owned by `root`
    pub fn hierarchy(&self, root: Entity) -> Option<hecs::Ref<'_, HierarchyBuffer>> {
        self.inner.get::<&HierarchyBuffer>(root).ok()
    }

    /// Get the cleanup record of a despawned root
    pub fn cleanup_record(&self, root: Entity) -> Option<&CleanupBuffer> {
        self.cleanup.get(&root)
    }

    /// Resolve an entity to its hierarchy slot, `None` if it is standalone
    pub fn resolve(&self, entity: Entity) -> Option<HierarchyHandle> {
        resolve(entity, self)
    }

    /// End-of-frame hierarchy maintenance.
    ///
    /// Ages cleanup records, detaching the surviving members of expired ones,
    /// then removes dead slots from live buffers and rewrites the surviving
    /// members' root references.
    pub fn end_frame(&mut self) -> FrameMaintenance {
        let mut maintenance = FrameMaintenance::default();

        let mut expired = Vec::new();
        for (root, record) in &mut self.cleanup {
            record.frames_remaining = record.frames_remaining.saturating_sub(1);
            if record.frames_remaining == 0 {
                expired.push(*root);
            }
        }
        for root in expired {
            if let Some(record) = self.cleanup.remove(&root) {
                maintenance.expired += 1;
                maintenance.detached += detach_members(&mut self.inner, &record.hierarchy);
            }
        }

        let roots: Vec<Entity> = self
            .inner
            .query::<&HierarchyBuffer>()
            .iter()
            .filter(|(_, buffer)| {
                buffer
                    .nodes()
                    .iter()
                    .any(|node| !self.inner.contains(node.entity()))
            })
            .map(|(root, _)| root)
            .collect();

        for root in roots {
            let Ok(mut buffer) = self.inner.remove_one::<HierarchyBuffer>(root) else {
                continue;
            };
            let before = buffer.len();
            let _ = buffer.compact(|entity| self.inner.contains(entity));

            for node in buffer.nodes().iter().skip(1) {
                if let Ok(mut reference) = self.inner.get::<&mut RootReference>(node.entity()) {
                    reference.index = node.index() as u32;
                }
            }

            maintenance.compacted += 1;
            maintenance.removed_slots += before - buffer.len();
            log::debug!(
                "compacted hierarchy of {:?}: {} -> {} slots",
                root,
                before,
                buffer.len()
            );
            if self.inner.insert_one(root, buffer).is_err() {
                log::warn!("root {:?} vanished during compaction", root);
            }
        }

        self.stats.record_frame();
        maintenance
    }
}

/// Remove the root references a buffer's members hold to its root. Returns how
/// many were removed.
fn detach_members(world: &mut hecs::World, buffer: &HierarchyBuffer) -> usize {
    let root = buffer.root();
    let mut detached = 0;
    for node in buffer.nodes().iter().skip(1) {
        let entity = node.entity();
        let owned = world
            .get::<&RootReference>(entity)
            .is_ok_and(|reference| reference.root == root);
        if owned && world.remove_one::<RootReference>(entity).is_ok() {
            detached += 1;
        }
    }
    detached
}

impl HierarchyLookup for World {
    fn root_reference(&self, entity: Entity) -> Option<RootReference> {
        self.inner.get::<&RootReference>(entity).ok().map(|r| *r)
    }

    fn has_hierarchy(&self, root: Entity) -> bool {
        self.inner
            .entity(root)
            .is_ok_and(|entity| entity.has::<HierarchyBuffer>())
    }

    fn has_cleanup(&self, root: Entity) -> bool {
        self.cleanup.contains_key(&root)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
