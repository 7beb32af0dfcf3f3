//! Scoped parallel access
//!
//! Writes to different hierarchies touch disjoint buffers and disjoint
//! entities, so they can run on separate workers. The world's own component
//! columns cannot be borrowed mutably from several threads at once, so each
//! pass snapshots the channel's components into a [`ComponentLookup`], lets
//! workers write through it, and copies the written values back afterwards.
//!
//! Workers only ever receive an [`AccessKey`] for the hierarchy they were
//! given, and [`ScopedAccess`] checks it against the owning root of every
//! entity it touches.

use std::cell::UnsafeCell;
use std::marker::PhantomData;

use hecs::Entity;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::propagate_resolved;
use crate::ecs::{
    BufferSource, HierarchyBuffer, HierarchyHandle, RootReference, World, WorldTransformComponent,
};
use crate::math::TransformQvvs;
use crate::propagation::access::WorldTransformAccess;
use crate::propagation::channel::TransformChannel;
use crate::propagation::command::TransformWrite;
use crate::propagation::engine::{PropagationReport, WriteStatus};
use crate::propagation::key::AccessKey;

// ============================================================================
// Component Lookup
// ============================================================================

struct LookupSlot<T> {
    entity: Entity,
    value: UnsafeCell<T>,
    written: UnsafeCell<bool>,
}

/// Random-access copy of one component type, indexed by entity id.
///
/// Generations are checked on every access, so a recycled id never aliases a
/// despawned entity's slot.
pub struct ComponentLookup<T> {
    slots: Vec<Option<LookupSlot<T>>>,
    len: usize,
}

// SAFETY: slots are only mutated through `write_unchecked`, whose contract rules
// out concurrent access to the same slot.
unsafe impl<T: Send + Sync> Sync for ComponentLookup<T> {}

impl<T: hecs::Component + Copy> ComponentLookup<T> {
    /// Snapshot every `T` in the world.
    pub fn from_world(world: &hecs::World) -> Self {
        let mut slots: Vec<Option<LookupSlot<T>>> = Vec::new();
        let mut len = 0;

        for (entity, value) in world.query::<&T>().iter() {
            let index = entity.id() as usize;
            if slots.len() <= index {
                slots.resize_with(index + 1, || None);
            }
            slots[index] = Some(LookupSlot {
                entity,
                value: UnsafeCell::new(*value),
                written: UnsafeCell::new(false),
            });
            len += 1;
        }

        Self { slots, len }
    }

    /// Number of entities in the table.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn slot(&self, entity: Entity) -> Option<&LookupSlot<T>> {
        self.slots
            .get(entity.id() as usize)?
            .as_ref()
            .filter(|slot| slot.entity == entity)
    }

    /// Check if `entity` has a slot.
    pub fn contains(&self, entity: Entity) -> bool {
        self.slot(entity).is_some()
    }

    /// Current value for `entity`.
    pub fn get(&self, entity: Entity) -> Option<T> {
        // SAFETY: writers to this slot are excluded by `write_unchecked`'s contract.
        self.slot(entity).map(|slot| unsafe { *slot.value.get() })
    }

    /// Overwrite the value for `entity`. Returns `false` if it has no slot.
    ///
    /// # Safety
    ///
    /// No other thread may read or write the slot for `entity` while this call
    /// runs.
    pub unsafe fn write_unchecked(&self, entity: Entity, value: T) -> bool {
        let Some(slot) = self.slot(entity) else {
            return false;
        };
        // SAFETY: exclusive access to this slot is the caller's obligation.
        unsafe {
            *slot.value.get() = value;
            *slot.written.get() = true;
        }
        true
    }

    /// Copy every written value back into the world. Returns how many were copied.
    pub fn write_back(self, world: &mut hecs::World) -> usize {
        let mut copied = 0;
        for slot in self.slots.into_iter().flatten() {
            if !slot.written.into_inner() {
                continue;
            }
            if let Ok(mut component) = world.get::<&mut T>(slot.entity) {
                *component = slot.value.into_inner();
                copied += 1;
            }
        }
        copied
    }
}

// ============================================================================
// Scoped Access
// ============================================================================

/// Channel access limited to the hierarchy an [`AccessKey`] was minted for.
pub struct ScopedAccess<'a, C: TransformChannel> {
    key: AccessKey,
    transforms: &'a ComponentLookup<C::Component>,
    world: &'a hecs::World,
    _channel: PhantomData<C>,
}

impl<'a, C: TransformChannel> ScopedAccess<'a, C> {
    /// Access `transforms` on behalf of the hierarchy `key` is bound to.
    ///
    /// `world` is only read, for root references.
    pub fn new(
        key: AccessKey,
        transforms: &'a ComponentLookup<C::Component>,
        world: &'a hecs::World,
    ) -> Self {
        Self {
            key,
            transforms,
            world,
            _channel: PhantomData,
        }
    }

    /// The key this access checks against.
    pub fn key(&self) -> AccessKey {
        self.key
    }

    fn owning_root(&self, entity: Entity) -> Entity {
        self.world
            .get::<&RootReference>(entity)
            .map_or(entity, |reference| reference.root)
    }
}

impl<C: TransformChannel> WorldTransformAccess<C> for ScopedAccess<'_, C> {
    fn read(&self, entity: Entity) -> Option<TransformQvvs> {
        self.key.validate(self.owning_root(entity));
        self.transforms
            .get(entity)
            .map(|component| component.transform())
    }

    fn write(&mut self, entity: Entity, transform: TransformQvvs) {
        self.key.validate(self.owning_root(entity));
        // SAFETY: the key matches this entity's hierarchy, and only the worker
        // holding that hierarchy's key reaches its members.
        unsafe {
            self.transforms
                .write_unchecked(entity, C::Component::from_transform(transform));
        }
    }
}

// ============================================================================
// Parallel Writes
// ============================================================================

type Batch = SmallVec<[(usize, Entity, HierarchyHandle, TransformWrite); 8]>;

/// Apply many writes, running each hierarchy's writes on its own worker.
///
/// Writes within one hierarchy keep their relative order. Writes to standalone
/// entities and to members of despawned roots are applied afterwards on the
/// calling thread. Reports come back in the order of `writes`.
pub fn par_write_transforms<C: TransformChannel>(
    world: &mut World,
    writes: &[(Entity, TransformWrite)],
) -> Vec<PropagationReport> {
    let mut batches: FxHashMap<Entity, Batch> = FxHashMap::default();
    let mut deferred = Vec::new();
    for (position, &(entity, write)) in writes.iter().enumerate() {
        match world.resolve(entity) {
            Some(handle) if handle.source() == BufferSource::Live => batches
                .entry(handle.root())
                .or_default()
                .push((position, entity, handle, write)),
            _ => deferred.push((position, entity, write)),
        }
    }

    let mut reports: Vec<(usize, PropagationReport)> = Vec::with_capacity(writes.len());
    if !batches.is_empty() {
        let parallel = batches.len() >= world.config.parallel_min_roots;
        let transforms = ComponentLookup::<C::Component>::from_world(&world.inner);
        let inner = &world.inner;

        let mut query = inner.query::<&mut HierarchyBuffer>();
        let jobs: Vec<(&mut HierarchyBuffer, Batch)> = query
            .iter()
            .filter_map(|(root, buffer)| batches.remove(&root).map(|batch| (buffer, batch)))
            .collect();
        log::trace!(
            "{} writes over {} hierarchies ({})",
            C::NAME,
            jobs.len(),
            if parallel { "parallel" } else { "sequential" }
        );

        if parallel {
            reports.par_extend(
                jobs.into_par_iter()
                    .flat_map_iter(|(buffer, batch)| run_hierarchy::<C>(buffer, &batch, &transforms, inner)),
            );
        } else {
            reports.extend(
                jobs.into_iter()
                    .flat_map(|(buffer, batch)| run_hierarchy::<C>(buffer, &batch, &transforms, inner)),
            );
        }
        drop(query);

        for (position, entity, _, _) in batches.into_values().flatten() {
            reports.push((position, PropagationReport::skipped(entity, WriteStatus::StaleHandle)));
        }

        let copied = transforms.write_back(&mut world.inner);
        log::trace!("copied {} {} transforms back", copied, C::NAME);
    }

    for (_, report) in &reports {
        world.stats.record(report);
    }
    for (position, entity, write) in deferred {
        reports.push((position, world.write_transform::<C>(entity, write)));
    }

    reports.sort_unstable_by_key(|(position, _)| *position);
    reports.into_iter().map(|(_, report)| report).collect()
}

fn run_hierarchy<C: TransformChannel>(
    buffer: &mut HierarchyBuffer,
    batch: &Batch,
    transforms: &ComponentLookup<C::Component>,
    world: &hecs::World,
) -> Vec<(usize, PropagationReport)> {
    // SAFETY: every root appears in at most one job, so this worker is the only
    // one touching this hierarchy's buffer and members.
    let key = unsafe { AccessKey::new(buffer.root()) };
    let mut access = ScopedAccess::<C>::new(key, transforms, world);

    batch
        .iter()
        .map(|&(position, entity, handle, write)| {
            key.validate(handle.root());
            let report =
                propagate_resolved::<C, _, _>(entity, handle, buffer, write, &mut access, world);
            (position, report)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PropagationConfig;
    use crate::ecs::{HierarchyBuilder, WorldTransform};
    use crate::propagation::engine::write_and_propagate;
    use crate::propagation::{Continuous, Ticked};
    use glam::{Quat, Vec3};

    /// Root with a chain of two children and a mirror under the first child.
    fn spawn_rig(world: &mut World, offset: f32) -> [Entity; 4] {
        let e = [world.spawn(()), world.spawn(()), world.spawn(()), world.spawn(())];
        let mut builder =
            HierarchyBuilder::new(e[0], TransformQvvs::from_translation(Vec3::new(offset, 0.0, 0.0)));
        builder
            .add(
                e[0],
                e[1],
                TransformQvvs::from_translation_rotation(Vec3::Y, Quat::from_rotation_z(0.5)),
                false,
            )
            .unwrap();
        builder.add_at(e[1], e[2], Vec3::new(0.0, 2.0, 0.0)).unwrap();
        builder.add(e[1], e[3], TransformQvvs::IDENTITY, true).unwrap();
        world.insert_hierarchy(builder.build()).unwrap();
        e
    }

    fn rig_writes(rig: &[Entity; 4]) -> Vec<(Entity, TransformWrite)> {
        vec![
            (rig[0], TransformWrite::RotationDelta(Quat::from_rotation_y(0.25))),
            (rig[1], TransformWrite::ScaleDelta(1.5)),
            (rig[3], TransformWrite::TranslationDelta(Vec3::X)),
            (rig[2], TransformWrite::Stretch(Vec3::new(2.0, 1.0, 1.0))),
        ]
    }

    #[test]
    fn test_lookup_generation_checked() {
        let mut world = hecs::World::new();
        let a = world.spawn((WorldTransform(TransformQvvs::IDENTITY),));
        world.despawn(a).unwrap();
        let b = world.spawn((WorldTransform(TransformQvvs::from_translation(Vec3::X)),));

        let lookup = ComponentLookup::<WorldTransform>::from_world(&world);
        assert_eq!(lookup.len(), 1);
        assert!(!lookup.contains(a));
        assert_eq!(lookup.get(b).unwrap().0.translation, Vec3::X);

        // SAFETY: single-threaded test.
        assert!(!unsafe { lookup.write_unchecked(a, WorldTransform(TransformQvvs::IDENTITY)) });
        assert!(unsafe { lookup.write_unchecked(b, WorldTransform(TransformQvvs::IDENTITY)) });
        assert_eq!(lookup.write_back(&mut world), 1);
        assert_eq!(world.get::<&WorldTransform>(b).unwrap().0, TransformQvvs::IDENTITY);
    }

    #[test]
    fn test_parallel_matches_immediate() {
        let config = PropagationConfig::default().with_parallel_min_roots(1);
        let mut scoped = World::with_config(config.clone());
        let mut immediate = World::with_config(config);

        let mut scoped_rigs = Vec::new();
        let mut immediate_rigs = Vec::new();
        for i in 0..6 {
            scoped_rigs.push(spawn_rig(&mut scoped, i as f32 * 10.0));
            immediate_rigs.push(spawn_rig(&mut immediate, i as f32 * 10.0));
        }

        let scoped_writes: Vec<_> = scoped_rigs.iter().flat_map(rig_writes).collect();
        let reports = par_write_transforms::<Continuous>(&mut scoped, &scoped_writes);
        assert_eq!(reports.len(), scoped_writes.len());
        for (report, (entity, _)) in reports.iter().zip(&scoped_writes) {
            assert_eq!(report.entity, *entity);
        }
        assert_eq!(reports[2].status, WriteStatus::MirrorRejected);
        assert_eq!(reports[0].status, WriteStatus::Propagated);

        for rig in &immediate_rigs {
            for (entity, write) in rig_writes(rig) {
                let _ = immediate.write_transform::<Continuous>(entity, write);
            }
        }

        for (s, i) in scoped_rigs.iter().zip(&immediate_rigs) {
            for (se, ie) in s.iter().zip(i) {
                let a = scoped.world_transform::<Continuous>(*se).unwrap();
                let b = immediate.world_transform::<Continuous>(*ie).unwrap();
                assert!(a.abs_diff_eq(&b, 1e-5));
            }
        }
        assert_eq!(scoped.stats().writes(), immediate.stats().writes());
        assert_eq!(scoped.stats().mirror_rejected(), 6);
    }

    #[test]
    fn test_sequential_below_threshold() {
        let mut world = World::with_config(PropagationConfig::default().with_parallel_min_roots(100));
        let rig = spawn_rig(&mut world, 0.0);

        let reports = par_write_transforms::<Ticked>(
            &mut world,
            &[(rig[0], TransformWrite::TranslationDelta(Vec3::Z))],
        );
        assert_eq!(reports[0].written, 4);
        assert_eq!(
            world.world_transform::<Ticked>(rig[3]),
            world.world_transform::<Ticked>(rig[1])
        );
        assert_eq!(
            world.world_transform::<Ticked>(rig[0]).unwrap().translation,
            Vec3::Z
        );
        // The continuous cache was not touched.
        assert_eq!(
            world.world_transform::<Continuous>(rig[0]).unwrap().translation,
            Vec3::ZERO
        );
    }

    #[test]
    fn test_deferred_writes() {
        let mut world = World::with_config(PropagationConfig::default().with_parallel_min_roots(1));
        let rig = spawn_rig(&mut world, 0.0);
        let loner = world.spawn(());
        world.despawn(rig[0]).unwrap();

        let reports = par_write_transforms::<Continuous>(
            &mut world,
            &[
                (loner, TransformWrite::TranslationDelta(Vec3::X)),
                (rig[1], TransformWrite::TranslationDelta(Vec3::Z)),
            ],
        );

        assert_eq!(reports[0].status, WriteStatus::Standalone);
        assert_eq!(reports[1].status, WriteStatus::Propagated);
        assert_eq!(
            world.world_transform::<Continuous>(loner).unwrap().translation,
            Vec3::X
        );
        assert_eq!(
            world.world_transform::<Continuous>(rig[3]),
            world.world_transform::<Continuous>(rig[1])
        );
    }

    #[test]
    fn test_dead_member_skipped() {
        let mut world = World::with_config(PropagationConfig::default().with_parallel_min_roots(1));
        let rig = spawn_rig(&mut world, 0.0);
        world.despawn(rig[1]).unwrap();

        let reports = par_write_transforms::<Continuous>(
            &mut world,
            &[(rig[0], TransformWrite::TranslationDelta(Vec3::Z))],
        );
        assert_eq!(reports[0].skipped_dead, 1);
        assert_eq!(reports[0].visited, 3);
        assert_eq!(reports[0].written, 3);
    }

    #[test]
    #[should_panic(expected = "access key for hierarchy")]
    fn test_key_mismatch_panics() {
        let mut world = World::new();
        let first = spawn_rig(&mut world, 0.0);
        let second = spawn_rig(&mut world, 5.0);

        let transforms = ComponentLookup::<WorldTransform>::from_world(&world.inner);
        let key = unsafe { AccessKey::new(first[0]) };
        let mut access = ScopedAccess::<Continuous>::new(key, &transforms, &world.inner);

        access.write(second[2], TransformQvvs::IDENTITY);
    }

    #[test]
    #[should_panic(expected = "access key for hierarchy")]
    fn test_engine_with_foreign_key_panics() {
        let mut world = World::new();
        let first = spawn_rig(&mut world, 0.0);
        let second = spawn_rig(&mut world, 5.0);

        let transforms = ComponentLookup::<WorldTransform>::from_world(&world.inner);
        let mut buffer = world.inner.remove_one::<HierarchyBuffer>(second[0]).unwrap();
        let key = unsafe { AccessKey::new(first[0]) };
        let mut access = ScopedAccess::<Continuous>::new(key, &transforms, &world.inner);

        let handle = HierarchyHandle::new(second[0], 0, BufferSource::Live);
        let _ = write_and_propagate::<Continuous, _, _>(
            handle,
            &mut buffer,
            TransformWrite::ScaleDelta(2.0),
            &mut access,
            &world.inner,
        );
    }
}
