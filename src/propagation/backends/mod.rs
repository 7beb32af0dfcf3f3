//! Storage backends
//!
//! Each backend adapts one way of reaching component storage to the
//! [`WorldTransformAccess`] and [`Liveness`] capabilities, then drives the same
//! propagation engine:
//!
//! - [`immediate`]: direct access to the whole world, single-threaded
//! - [`brokered`]: access gated by a declared component request
//! - [`scoped`]: snapshot tables written from parallel workers, one hierarchy each

pub mod brokered;
pub mod immediate;
pub mod scoped;

use hecs::Entity;

use super::access::{Liveness, WorldTransformAccess};
use super::channel::TransformChannel;
use super::command::TransformWrite;
use super::engine::{PropagationReport, WriteStatus, write_and_propagate};
use crate::ecs::{HierarchyBuffer, HierarchyHandle};

/// Propagate a write whose handle was resolved from `entity`.
///
/// A handle whose slot now belongs to another entity (a root reference not yet
/// rewritten after compaction) is reported stale instead of writing the wrong node.
pub(crate) fn propagate_resolved<C, A, L>(
    entity: Entity,
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
    match hierarchy.get(handle.index()) {
        Some(node) if node.entity() == entity => {
            write_and_propagate::<C, A, L>(handle, hierarchy, write, access, liveness)
        }
        slot => {
            log::warn!(
                "{:?} resolved to slot {} of {:?} which holds {:?}",
                entity,
                handle.index(),
                handle.root(),
                slot.map(|node| node.entity())
            );
            PropagationReport::skipped(entity, WriteStatus::StaleHandle)
        }
    }
}
