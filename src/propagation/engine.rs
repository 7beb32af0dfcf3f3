//! Write-and-propagate
//!
//! Applies one write to a hierarchy slot and recomputes every descendant's
//! cached world transform by scanning forward through the pre-order buffer.
//! The target is always updated before any descendant, and descendants are
//! visited in ascending slot order, so each one reads an already updated parent.
//!
//! The engine is synchronous and storage-agnostic: results leave through a
//! [`WorldTransformAccess`] and liveness comes from a [`Liveness`] query.

use hecs::Entity;

use super::access::{Liveness, WorldTransformAccess};
use super::channel::TransformChannel;
use super::command::{TransformWrite, apply_delta};
use crate::ecs::{HierarchyBuffer, HierarchyHandle, HierarchyNode};
use crate::math::TransformQvvs;

// ============================================================================
// Report
// ============================================================================

/// What happened to a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteStatus {
    /// The target and its subtree were updated
    Propagated,
    /// The target belongs to no hierarchy and was written directly
    Standalone,
    /// The target mirrors its parent; nothing was written
    MirrorRejected,
    /// The target entity is dead; nothing was written
    TargetDead,
    /// The handle pointed outside its buffer or at another entity's slot
    StaleHandle,
}

/// Outcome of one write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct PropagationReport {
    /// Entity the write was aimed at
    pub entity: Entity,
    /// What happened
    pub status: WriteStatus,
    /// Descendant slots recomputed
    pub visited: usize,
    /// Transforms written out through the accessor
    pub written: usize,
    /// Descendant slots skipped because their entity is dead
    pub skipped_dead: usize,
}

impl PropagationReport {
    /// A report for a write that touched nothing.
    pub const fn skipped(entity: Entity, status: WriteStatus) -> Self {
        Self {
            entity,
            status,
            visited: 0,
            written: 0,
            skipped_dead: 0,
        }
    }

    /// Whether anything was written.
    #[must_use]
    pub const fn wrote(&self) -> bool {
        self.written > 0
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Apply `write` to the slot named by `handle` and propagate to its subtree.
///
/// - Writes to mirror nodes are rejected without touching anything.
/// - A dead target aborts the whole write.
/// - Dead descendants still have their slot cache recomputed so their own
///   descendants stay correct, but nothing is written out for them.
///
/// # Panics
///
/// Panics if `hierarchy` is not the buffer owned by `handle.root()`.
pub fn write_and_propagate<C, A, L>(
    handle: HierarchyHandle,
    hierarchy: &mut HierarchyBuffer,
    write: TransformWrite,
    access: &mut A,
    liveness: &L,
) -> PropagationReport
where
    C: TransformChannel,
    A: WorldTransformAccess<C> + ?Sized,
    L: Liveness + ?Sized,
{
    assert_eq!(
        hierarchy.root(),
        handle.root(),
        "handle resolved against a different hierarchy buffer"
    );

    let target = handle.index();
    let Some(node) = hierarchy.get(target) else {
        log::warn!(
            "handle slot {} is outside the {}-slot hierarchy of {:?}",
            target,
            hierarchy.len(),
            hierarchy.root()
        );
        return PropagationReport::skipped(hierarchy.root(), WriteStatus::StaleHandle);
    };

    let entity = node.entity();
    if node.mirrors_parent() {
        log::debug!("{:?} mirrors its parent, {:?} ignored", entity, write.kind());
        return PropagationReport::skipped(entity, WriteStatus::MirrorRejected);
    }
    if !liveness.is_alive(entity) {
        log::debug!("{:?} is dead, {:?} ignored", entity, write.kind());
        return PropagationReport::skipped(entity, WriteStatus::TargetDead);
    }

    let nodes = hierarchy.nodes_mut();
    let parent_world = node_parent_world::<C>(nodes, target);
    let updated = write.apply(*C::cache(&nodes[target]), parent_world);
    *C::cache_mut(&mut nodes[target]) = updated;
    access.write(entity, updated.world);

    let mut report = PropagationReport {
        entity,
        status: WriteStatus::Propagated,
        visited: 0,
        written: 1,
        skipped_dead: 0,
    };

    for index in target + 1..nodes.len() {
        let Some(parent) = nodes[index].parent_index().filter(|&p| p >= target) else {
            break;
        };

        let parent_world = C::cache(&nodes[parent]).world;
        let node = &mut nodes[index];
        let mirrors = node.mirrors_parent();
        let cache = C::cache_mut(node);
        cache.world = if mirrors {
            parent_world
        } else {
            parent_world * cache.local
        };
        let world = cache.world;
        report.visited += 1;

        let descendant = node.entity();
        if liveness.is_alive(descendant) {
            access.write(descendant, world);
            report.written += 1;
        } else {
            report.skipped_dead += 1;
        }
    }

    log::trace!(
        "{} {:?} on {:?}: {} descendants, {} written, {} dead",
        C::NAME,
        write.kind(),
        entity,
        report.visited,
        report.written,
        report.skipped_dead
    );

    report
}

fn node_parent_world<C: TransformChannel>(
    nodes: &[HierarchyNode],
    index: usize,
) -> Option<TransformQvvs> {
    nodes[index]
        .parent_index()
        .map(|parent| C::cache(&nodes[parent]).world)
}

/// Write to an entity that belongs to no hierarchy.
///
/// Its local and world transforms coincide, so the write is applied to the
/// current world transform and stored. Entities without the channel's component
/// start from identity.
pub fn write_standalone<C, A, L>(
    entity: Entity,
    write: TransformWrite,
    access: &mut A,
    liveness: &L,
) -> PropagationReport
where
    C: TransformChannel,
    A: WorldTransformAccess<C> + ?Sized,
    L: Liveness + ?Sized,
{
    if !liveness.is_alive(entity) {
        log::debug!("{:?} is dead, {:?} ignored", entity, write.kind());
        return PropagationReport::skipped(entity, WriteStatus::TargetDead);
    }

    let current = access.read(entity).unwrap_or_default();
    access.write(entity, apply_delta(current, write));

    PropagationReport {
        entity,
        status: WriteStatus::Standalone,
        visited: 0,
        written: 1,
        skipped_dead: 0,
    }
}
