//! Request-scoped component access
//!
//! A [`ComponentBroker`] only hands out the component types its
//! [`BrokerRequest`] declared, reads and writes separately. Touching anything
//! else is a bug in the calling pass and panics. The broker never changes the
//! world's structure: no spawns, no inserts, no removals.

use std::any::{TypeId, type_name};
use std::marker::PhantomData;

use hecs::Entity;
use rustc_hash::{FxHashMap, FxHashSet};

use super::propagate_resolved;
use crate::core::PropagationStats;
use crate::ecs::{
    BufferSource, CleanupBuffer, HierarchyBuffer, HierarchyLookup, RootReference, World,
    WorldTransformComponent, resolve,
};
use crate::math::TransformQvvs;
use crate::propagation::access::{Liveness, WorldTransformAccess};
use crate::propagation::channel::TransformChannel;
use crate::propagation::command::TransformWrite;
use crate::propagation::engine::{PropagationReport, WriteStatus, write_standalone};

/// Component types a pass intends to read and write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrokerRequest {
    reads: FxHashSet<TypeId>,
    writes: FxHashSet<TypeId>,
}

impl BrokerRequest {
    /// An empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare read access to `T`.
    #[must_use]
    pub fn read<T: hecs::Component>(mut self) -> Self {
        self.reads.insert(TypeId::of::<T>());
        self
    }

    /// Declare write access to `T`. Writing implies reading.
    #[must_use]
    pub fn write<T: hecs::Component>(mut self) -> Self {
        self.reads.insert(TypeId::of::<T>());
        self.writes.insert(TypeId::of::<T>());
        self
    }

    /// Everything a propagating write on channel `C` touches.
    #[must_use]
    pub fn for_channel<C: TransformChannel>() -> Self {
        Self::new()
            .write::<C::Component>()
            .write::<HierarchyBuffer>()
            .read::<RootReference>()
    }

    /// Combine two requests.
    #[must_use]
    pub fn merge(mut self, other: &Self) -> Self {
        self.reads.extend(other.reads.iter().copied());
        self.writes.extend(other.writes.iter().copied());
        self
    }

    /// Whether `T` may be read.
    pub fn can_read<T: hecs::Component>(&self) -> bool {
        self.reads.contains(&TypeId::of::<T>())
    }

    /// Whether `T` may be written.
    pub fn can_write<T: hecs::Component>(&self) -> bool {
        self.writes.contains(&TypeId::of::<T>())
    }

    /// Whether every type in `other` is covered by this request.
    pub fn covers(&self, other: &Self) -> bool {
        other.reads.is_subset(&self.reads) && other.writes.is_subset(&self.writes)
    }
}

/// Shared view that enforces a request.
#[derive(Clone, Copy)]
struct Gate<'a> {
    world: &'a hecs::World,
    request: &'a BrokerRequest,
}

impl<'a> Gate<'a> {
    #[track_caller]
    fn get<T: hecs::Component>(self, entity: Entity) -> Option<hecs::Ref<'a, T>> {
        if !self.request.can_read::<T>() {
            panic!("component {} was not requested for reading", type_name::<T>());
        }
        self.world.get::<&T>(entity).ok()
    }

    #[track_caller]
    fn get_mut<T: hecs::Component>(self, entity: Entity) -> Option<hecs::RefMut<'a, T>> {
        if !self.request.can_write::<T>() {
            panic!("component {} was not requested for writing", type_name::<T>());
        }
        self.world.get::<&mut T>(entity).ok()
    }
}

/// Handle resolution through a gate, falling back to cleanup records.
struct BrokerLookup<'a> {
    gate: Gate<'a>,
    cleanup: &'a FxHashMap<Entity, CleanupBuffer>,
}

impl HierarchyLookup for BrokerLookup<'_> {
    fn root_reference(&self, entity: Entity) -> Option<RootReference> {
        self.gate.get::<RootReference>(entity).map(|r| *r)
    }

    fn has_hierarchy(&self, root: Entity) -> bool {
        self.gate
            .world
            .entity(root)
            .is_ok_and(|entity| entity.has::<HierarchyBuffer>())
    }

    fn has_cleanup(&self, root: Entity) -> bool {
        self.cleanup.contains_key(&root)
    }
}

/// Component access restricted to one request, for the length of one pass.
pub struct ComponentBroker<'w> {
    world: &'w hecs::World,
    cleanup: &'w mut FxHashMap<Entity, CleanupBuffer>,
    stats: &'w mut PropagationStats,
    request: BrokerRequest,
}

impl World {
    /// Open a broker over this world for the given request.
    pub fn broker(&mut self, request: BrokerRequest) -> ComponentBroker<'_> {
        ComponentBroker {
            world: &self.inner,
            cleanup: &mut self.cleanup,
            stats: &mut self.stats,
            request,
        }
    }
}

impl ComponentBroker<'_> {
    /// The request this broker enforces.
    pub fn request(&self) -> &BrokerRequest {
        &self.request
    }

    fn gate(&self) -> Gate<'_> {
        Gate {
            world: self.world,
            request: &self.request,
        }
    }

    /// Read a requested component.
    ///
    /// # Panics
    ///
    /// Panics if `T` was not requested for reading.
    #[track_caller]
    pub fn get<T: hecs::Component>(&self, entity: Entity) -> Option<hecs::Ref<'_, T>> {
        self.gate().get::<T>(entity)
    }

    /// Write a requested component.
    ///
    /// # Panics
    ///
    /// Panics if `T` was not requested for writing.
    #[track_caller]
    pub fn get_mut<T: hecs::Component>(&self, entity: Entity) -> Option<hecs::RefMut<'_, T>> {
        self.gate().get_mut::<T>(entity)
    }

    /// Cached world transform of an entity on one channel.
    #[track_caller]
    pub fn world_transform<C: TransformChannel>(&self, entity: Entity) -> Option<TransformQvvs> {
        self.get::<C::Component>(entity).map(|c| c.transform())
    }

    /// Write an entity's transform and propagate it through its hierarchy.
    ///
    /// A standalone entity without the channel's component is left alone.
    ///
    /// # Panics
    ///
    /// Panics if the request does not cover [`BrokerRequest::for_channel`].
    #[track_caller]
    pub fn write_transform<C: TransformChannel>(
        &mut self,
        entity: Entity,
        write: TransformWrite,
    ) -> PropagationReport {
        if !self.request.covers(&BrokerRequest::for_channel::<C>()) {
            panic!(
                "broker request does not cover {} transform propagation",
                C::NAME
            );
        }

        let gate = Gate {
            world: self.world,
            request: &self.request,
        };
        let liveness = self.world;
        let mut access = BrokeredAccess::<C> {
            gate,
            _channel: PhantomData,
        };
        let handle = resolve(
            entity,
            &BrokerLookup {
                gate,
                cleanup: &*self.cleanup,
            },
        );

        let report = match handle {
            None if gate.world.entity(entity).is_ok_and(|e| e.has::<C::Component>()) => {
                write_standalone::<C, _, _>(entity, write, &mut access, liveness)
            }
            None if liveness.is_alive(entity) => {
                log::debug!("{:?} has no {} transform, broker write skipped", entity, C::NAME);
                PropagationReport::skipped(entity, WriteStatus::Standalone)
            }
            None => PropagationReport::skipped(entity, WriteStatus::TargetDead),
            Some(handle) => match handle.source() {
                BufferSource::Live => match gate.get_mut::<HierarchyBuffer>(handle.root()) {
                    Some(mut buffer) => propagate_resolved::<C, _, _>(
                        entity,
                        handle,
                        &mut buffer,
                        write,
                        &mut access,
                        liveness,
                    ),
                    None => PropagationReport::skipped(entity, WriteStatus::StaleHandle),
                },
                BufferSource::Cleanup => match self.cleanup.get_mut(&handle.root()) {
                    Some(record) => propagate_resolved::<C, _, _>(
                        entity,
                        handle,
                        &mut record.hierarchy,
                        write,
                        &mut access,
                        liveness,
                    ),
                    None => PropagationReport::skipped(entity, WriteStatus::StaleHandle),
                },
            },
        };

        self.stats.record(&report);
        report
    }
}

/// Channel access through a broker's gate.
struct BrokeredAccess<'a, C> {
    gate: Gate<'a>,
    _channel: PhantomData<C>,
}

impl<C: TransformChannel> WorldTransformAccess<C> for BrokeredAccess<'_, C> {
    fn read(&self, entity: Entity) -> Option<TransformQvvs> {
        self.gate
            .get::<C::Component>(entity)
            .map(|component| component.transform())
    }

    fn write(&mut self, entity: Entity, transform: TransformQvvs) {
        if let Some(mut component) = self.gate.get_mut::<C::Component>(entity) {
            component.set_transform(transform);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{HierarchyBuilder, Name, WorldTransform};
    use crate::propagation::{Continuous, Ticked};
    use glam::Vec3;

    fn scene(world: &mut World) -> (Entity, Entity, Entity) {
        let (r, a, b) = (world.spawn(()), world.spawn(()), world.spawn(()));
        let mut builder = HierarchyBuilder::new(r, TransformQvvs::IDENTITY);
        builder.add_at(r, a, Vec3::X).unwrap();
        builder
            .add(a, b, TransformQvvs::from_translation(Vec3::splat(9.0)), true)
            .unwrap();
        world.insert_hierarchy(builder.build()).unwrap();
        (r, a, b)
    }

    #[test]
    fn test_request_covers() {
        let request = BrokerRequest::for_channel::<Continuous>();
        assert!(request.can_write::<WorldTransform>());
        assert!(request.can_read::<RootReference>());
        assert!(!request.can_write::<RootReference>());
        assert!(!request.covers(&BrokerRequest::for_channel::<Ticked>()));

        let both = request.merge(&BrokerRequest::for_channel::<Ticked>());
        assert!(both.covers(&BrokerRequest::for_channel::<Continuous>()));
        assert!(both.covers(&BrokerRequest::for_channel::<Ticked>()));
    }

    #[test]
    fn test_brokered_propagation_and_mirror() {
        let mut world = World::new();
        let (r, a, b) = scene(&mut world);

        let mut broker = world.broker(BrokerRequest::for_channel::<Continuous>());
        let report = broker.write_transform::<Continuous>(
            r,
            TransformWrite::WorldTransform(TransformQvvs::from_translation(Vec3::new(0.0, 0.0, 4.0))),
        );
        assert_eq!(report.status, WriteStatus::Propagated);
        assert_eq!(
            broker.world_transform::<Continuous>(a).unwrap().translation,
            Vec3::new(1.0, 0.0, 4.0)
        );
        assert_eq!(
            broker.world_transform::<Continuous>(b).unwrap(),
            broker.world_transform::<Continuous>(a).unwrap()
        );

        let report = broker.write_transform::<Continuous>(b, TransformWrite::ScaleDelta(2.0));
        assert_eq!(report.status, WriteStatus::MirrorRejected);
        assert_eq!(world.stats().writes(), 2);
    }

    #[test]
    fn test_brokered_matches_immediate() {
        let writes = [
            TransformWrite::ScaleDelta(2.0),
            TransformWrite::Stretch(Vec3::new(1.0, 2.0, 3.0)),
            TransformWrite::TranslationDelta(Vec3::Y),
        ];

        let mut immediate = World::new();
        let (_, ia, ib) = scene(&mut immediate);
        for write in writes {
            let _ = immediate.write_transform::<Continuous>(ia, write);
        }

        let mut brokered = World::new();
        let (_, ba, bb) = scene(&mut brokered);
        {
            let mut broker = brokered.broker(BrokerRequest::for_channel::<Continuous>());
            for write in writes {
                let _ = broker.write_transform::<Continuous>(ba, write);
            }
        }

        assert_eq!(
            immediate.world_transform::<Continuous>(ia),
            brokered.world_transform::<Continuous>(ba)
        );
        assert_eq!(
            immediate.world_transform::<Continuous>(ib),
            brokered.world_transform::<Continuous>(bb)
        );
    }

    #[test]
    fn test_brokered_standalone_never_inserts() {
        let mut world = World::new();
        let bare = world.spawn((Name::new("bare"),));
        let placed = world.spawn((WorldTransform(TransformQvvs::IDENTITY),));

        let mut broker = world.broker(BrokerRequest::for_channel::<Continuous>());
        let report = broker.write_transform::<Continuous>(bare, TransformWrite::ScaleDelta(3.0));
        assert_eq!(report.status, WriteStatus::Standalone);
        assert!(!report.wrote());

        let report = broker.write_transform::<Continuous>(placed, TransformWrite::ScaleDelta(3.0));
        assert!(report.wrote());

        assert!(world.world_transform::<Continuous>(bare).is_none());
        assert_eq!(world.world_transform::<Continuous>(placed).unwrap().scale, 3.0);
    }

    #[test]
    fn test_brokered_cleanup_fallback() {
        let mut world = World::new();
        let (r, a, b) = scene(&mut world);
        world.despawn(r).unwrap();

        let mut broker = world.broker(BrokerRequest::for_channel::<Continuous>());
        let report = broker.write_transform::<Continuous>(a, TransformWrite::TranslationDelta(Vec3::Z));
        assert_eq!(report.status, WriteStatus::Propagated);
        assert_eq!(
            broker.world_transform::<Continuous>(b).unwrap().translation,
            Vec3::new(1.0, 0.0, 1.0)
        );
    }

    #[test]
    #[should_panic(expected = "was not requested for reading")]
    fn test_undeclared_read_panics() {
        let mut world = World::new();
        let named = world.spawn((Name::new("n"),));

        let broker = world.broker(BrokerRequest::for_channel::<Continuous>());
        let _ = broker.get::<Name>(named);
    }

    #[test]
    #[should_panic(expected = "does not cover ticked")]
    fn test_uncovered_channel_panics() {
        let mut world = World::new();
        let (r, _, _) = scene(&mut world);

        let mut broker = world.broker(BrokerRequest::for_channel::<Continuous>());
        let _ = broker.write_transform::<Ticked>(r, TransformWrite::ScaleDelta(2.0));
    }
}
