//! Immediate whole-world access
//!
//! Reads and writes components straight through the world. Single-threaded: the
//! caller holds the world for the whole write.

use std::marker::PhantomData;

use hecs::Entity;

use super::propagate_resolved;
use crate::ecs::{BufferSource, HierarchyBuffer, World, WorldTransformComponent};
use crate::math::TransformQvvs;
use crate::propagation::access::WorldTransformAccess;
use crate::propagation::channel::TransformChannel;
use crate::propagation::command::{TransformWrite, apply_delta};
use crate::propagation::engine::{PropagationReport, WriteStatus, write_standalone};

/// Direct channel access over a hecs world.
pub struct ImmediateAccess<'w, C: TransformChannel> {
    world: &'w hecs::World,
    _channel: PhantomData<C>,
}

impl<'w, C: TransformChannel> ImmediateAccess<'w, C> {
    /// Wrap a world.
    pub fn new(world: &'w hecs::World) -> Self {
        Self {
            world,
            _channel: PhantomData,
        }
    }
}

impl<C: TransformChannel> WorldTransformAccess<C> for ImmediateAccess<'_, C> {
    fn read(&self, entity: Entity) -> Option<TransformQvvs> {
        self.world
            .get::<&C::Component>(entity)
            .ok()
            .map(|component| component.transform())
    }

    fn write(&mut self, entity: Entity, transform: TransformQvvs) {
        if let Ok(mut component) = self.world.get::<&mut C::Component>(entity) {
            component.set_transform(transform);
        }
    }
}

impl World {
    /// Write an entity's transform and propagate it through its hierarchy.
    ///
    /// Standalone entities are written directly; one missing the channel's
    /// component gets it inserted, starting from identity.
    pub fn write_transform<C: TransformChannel>(
        &mut self,
        entity: Entity,
        write: TransformWrite,
    ) -> PropagationReport {
        let report = match self.resolve(entity) {
            None => self.write_unparented::<C>(entity, write),
            Some(handle) => {
                let inner: &hecs::World = &self.inner;
                let mut access = ImmediateAccess::<C>::new(inner);
                match handle.source() {
                    BufferSource::Live => match inner.get::<&mut HierarchyBuffer>(handle.root()) {
                        Ok(mut buffer) => propagate_resolved::<C, _, _>(
                            entity,
                            handle,
                            &mut buffer,
                            write,
                            &mut access,
                            inner,
                        ),
                        Err(_) => PropagationReport::skipped(entity, WriteStatus::StaleHandle),
                    },
                    BufferSource::Cleanup => match self.cleanup.get_mut(&handle.root()) {
                        Some(record) => propagate_resolved::<C, _, _>(
                            entity,
                            handle,
                            &mut record.hierarchy,
                            write,
                            &mut access,
                            inner,
                        ),
                        None => PropagationReport::skipped(entity, WriteStatus::StaleHandle),
                    },
                }
            }
        };

        self.stats.record(&report);
        report
    }

    fn write_unparented<C: TransformChannel>(
        &mut self,
        entity: Entity,
        write: TransformWrite,
    ) -> PropagationReport {
        let has_component = match self.inner.entity(entity) {
            Ok(entity_ref) => entity_ref.has::<C::Component>(),
            Err(_) => return PropagationReport::skipped(entity, WriteStatus::TargetDead),
        };

        if has_component {
            let mut access = ImmediateAccess::<C>::new(&self.inner);
            return write_standalone::<C, _, _>(entity, write, &mut access, &self.inner);
        }

        let transform = apply_delta(TransformQvvs::IDENTITY, write);
        if self
            .inner
            .insert_one(entity, C::Component::from_transform(transform))
            .is_err()
        {
            return PropagationReport::skipped(entity, WriteStatus::TargetDead);
        }
        log::trace!("inserted {} transform on {:?}", C::NAME, entity);

        PropagationReport {
            entity,
            status: WriteStatus::Standalone,
            visited: 0,
            written: 1,
            skipped_dead: 0,
        }
    }

    /// Cached world transform of an entity on one channel.
    pub fn world_transform<C: TransformChannel>(&self, entity: Entity) -> Option<TransformQvvs> {
        ImmediateAccess::<C>::new(&self.inner).read(entity)
    }
}
