//! Flattened entity hierarchies
//!
//! Every hierarchy is stored as a single pre-order buffer owned by its root
//! entity. Slot 0 is the root itself, and each node's whole subtree occupies the
//! contiguous range of slots directly after it. Propagation relies on this: a
//! forward scan from a node visits exactly its descendants, parents first, and
//! stops at the first slot whose parent lies before the node.
//!
//! Indices are the only stable reference into a buffer. Nodes never point at
//! each other through anything but their parent index.

use glam::Vec3;
use hecs::Entity;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::core::HierarchyError;
use crate::math::TransformQvvs;

/// Parent index stored on the root slot.
pub const NO_PARENT: usize = usize::MAX;

// ============================================================================
// Nodes
// ============================================================================

/// Local and world transform cached on a node for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NodeCache {
    /// Transform relative to the direct parent
    pub local: TransformQvvs,
    /// Absolute transform, derived from the parent chain
    pub world: TransformQvvs,
}

impl NodeCache {
    /// Cache for a node whose local and world transforms coincide.
    #[must_use]
    pub const fn unparented(transform: TransformQvvs) -> Self {
        Self {
            local: transform,
            world: transform,
        }
    }
}

/// One slot of a hierarchy buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyNode {
    entity: Entity,
    index: usize,
    parent: usize,
    mirrors_parent: bool,
    continuous: NodeCache,
    ticked: NodeCache,
}

impl HierarchyNode {
    fn root(entity: Entity, transform: TransformQvvs) -> Self {
        Self {
            entity,
            index: 0,
            parent: NO_PARENT,
            mirrors_parent: false,
            continuous: NodeCache::unparented(transform),
            ticked: NodeCache::unparented(transform),
        }
    }

    /// Entity owning this slot.
    #[must_use]
    #[inline]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Position of this slot in its buffer.
    #[must_use]
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Index of the direct parent, `None` for the root slot.
    #[must_use]
    #[inline]
    pub fn parent_index(&self) -> Option<usize> {
        (self.parent != NO_PARENT).then_some(self.parent)
    }

    /// Whether this node's world transform is always its parent's world transform.
    #[must_use]
    #[inline]
    pub fn mirrors_parent(&self) -> bool {
        self.mirrors_parent
    }

    /// Continuous cache.
    #[must_use]
    #[inline]
    pub fn continuous(&self) -> &NodeCache {
        &self.continuous
    }

    /// Continuous cache (mutable).
    #[inline]
    pub fn continuous_mut(&mut self) -> &mut NodeCache {
        &mut self.continuous
    }

    /// Ticked cache.
    #[must_use]
    #[inline]
    pub fn ticked(&self) -> &NodeCache {
        &self.ticked
    }

    /// Ticked cache (mutable).
    #[inline]
    pub fn ticked_mut(&mut self) -> &mut NodeCache {
        &mut self.ticked
    }
}

// ============================================================================
// Hierarchy Buffer
// ============================================================================

/// Pre-order flattened hierarchy, stored as a component on its root entity.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyBuffer {
    root: Entity,
    nodes: Vec<HierarchyNode>,
}

impl HierarchyBuffer {
    /// Root entity owning this buffer.
    #[must_use]
    #[inline]
    pub fn root(&self) -> Entity {
        self.root
    }

    /// Number of slots, root included.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root slot is never removed.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All slots in pre-order.
    #[must_use]
    #[inline]
    pub fn nodes(&self) -> &[HierarchyNode] {
        &self.nodes
    }

    /// All slots in pre-order (mutable).
    #[inline]
    pub fn nodes_mut(&mut self) -> &mut [HierarchyNode] {
        &mut self.nodes
    }

    /// Get a slot.
    #[must_use]
    #[inline]
    pub fn get(&self, index: usize) -> Option<&HierarchyNode> {
        self.nodes.get(index)
    }

    /// Get a slot (mutable).
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut HierarchyNode> {
        self.nodes.get_mut(index)
    }

    /// Find the slot owned by `entity`. Linear in the buffer size.
    #[must_use]
    pub fn index_of(&self, entity: Entity) -> Option<usize> {
        self.nodes.iter().position(|node| node.entity == entity)
    }

    /// One past the last slot of the subtree rooted at `index`.
    #[must_use]
    pub fn subtree_end(&self, index: usize) -> usize {
        self.nodes[index + 1..]
            .iter()
            .position(|node| node.parent_index().is_none_or(|parent| parent < index))
            .map_or(self.nodes.len(), |offset| index + 1 + offset)
    }

    /// Entities in the subtree rooted at `index`, the node itself first.
    pub fn subtree(&self, index: usize) -> impl Iterator<Item = Entity> + '_ {
        self.nodes[index..self.subtree_end(index)]
            .iter()
            .map(HierarchyNode::entity)
    }

    /// Check the pre-order contiguity invariant.
    ///
    /// Every slot after the root must name as parent either the previous slot or
    /// one of the previous slot's ancestors.
    ///
    /// # Errors
    ///
    /// Returns the first slot that breaks the invariant.
    pub fn validate(&self) -> Result<(), HierarchyError> {
        let Some(root) = self.nodes.first() else {
            return Err(HierarchyError::NotPreOrder { index: 0 });
        };
        if root.entity != self.root || root.parent_index().is_some() {
            return Err(HierarchyError::NotPreOrder { index: 0 });
        }
        if root.mirrors_parent {
            return Err(HierarchyError::MirrorRoot(root.entity));
        }

        let mut ancestors: SmallVec<[usize; 16]> = SmallVec::new();
        ancestors.push(0);
        for (index, node) in self.nodes.iter().enumerate() {
            if node.index != index {
                return Err(HierarchyError::IndexMismatch {
                    index,
                    stored: node.index,
                });
            }
            if index == 0 {
                continue;
            }

            let Some(parent) = node.parent_index() else {
                return Err(HierarchyError::NotPreOrder { index });
            };
            while ancestors.last().is_some_and(|&top| top != parent) {
                ancestors.pop();
            }
            if ancestors.is_empty() {
                return Err(HierarchyError::NotPreOrder { index });
            }
            ancestors.push(index);
        }

        Ok(())
    }

    /// Remove slots whose entity is dead.
    ///
    /// Surviving nodes under a removed slot are re-parented onto the nearest
    /// surviving ancestor, and their local transforms are re-derived from their
    /// cached world transforms so nothing moves. A mirror node that loses its
    /// parent stops mirroring. The root slot is always kept.
    ///
    /// Returns the new index of every old slot, `NO_PARENT` for removed ones.
    pub fn compact(&mut self, mut is_alive: impl FnMut(Entity) -> bool) -> Vec<usize> {
        let old = std::mem::take(&mut self.nodes);
        let mut remap = vec![NO_PARENT; old.len()];
        // For removed slots: new index of the nearest surviving ancestor.
        let mut removed: Vec<Option<usize>> = vec![None; old.len()];

        for (old_index, mut node) in old.into_iter().enumerate() {
            let Some(parent) = node.parent_index() else {
                remap[old_index] = self.nodes.len();
                node.index = self.nodes.len();
                self.nodes.push(node);
                continue;
            };

            if !is_alive(node.entity) {
                removed[old_index] = Some(removed[parent].unwrap_or(remap[parent]));
                continue;
            }

            match removed[parent] {
                Some(ancestor) => {
                    let anchor = &self.nodes[ancestor];
                    node.continuous.local = node
                        .continuous
                        .world
                        .relative_to(&anchor.continuous.world)
                        .unwrap_or(node.continuous.local);
                    node.ticked.local = node
                        .ticked
                        .world
                        .relative_to(&anchor.ticked.world)
                        .unwrap_or(node.ticked.local);
                    node.mirrors_parent = false;
                    node.parent = ancestor;
                }
                None => node.parent = remap[parent],
            }

            node.index = self.nodes.len();
            remap[old_index] = node.index;
            self.nodes.push(node);
        }

        remap
    }
}

// ============================================================================
// Cleanup Record
// ============================================================================

/// A retired hierarchy buffer, kept alive for a few frames after its root is
/// despawned so in-flight writes through its members can still resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanupBuffer {
    /// Copy of the buffer as it was when the root was despawned
    pub hierarchy: HierarchyBuffer,
    /// Frames left before the record is dropped
    pub frames_remaining: u32,
}

impl CleanupBuffer {
    /// Retire a buffer for `frames` frames.
    #[must_use]
    pub fn new(hierarchy: HierarchyBuffer, frames: u32) -> Self {
        Self {
            hierarchy,
            frames_remaining: frames,
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct PendingNode {
    local: TransformQvvs,
    mirrors_parent: bool,
}

/// Declares a hierarchy as a tree and flattens it into a [`HierarchyBuffer`].
///
/// Children are laid out in the order they were added.
#[derive(Debug, Clone)]
pub struct HierarchyBuilder {
    root: Entity,
    root_transform: TransformQvvs,
    pending: FxHashMap<Entity, PendingNode>,
    children: FxHashMap<Entity, SmallVec<[Entity; 8]>>,
}

impl HierarchyBuilder {
    /// Start a hierarchy at `root` with the given world transform.
    #[must_use]
    pub fn new(root: Entity, root_transform: TransformQvvs) -> Self {
        Self {
            root,
            root_transform,
            pending: FxHashMap::default(),
            children: FxHashMap::default(),
        }
    }

    /// Root entity of the hierarchy being built.
    #[must_use]
    pub fn root(&self) -> Entity {
        self.root
    }

    /// Check if `entity` has been added (the root counts).
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        entity == self.root || self.pending.contains_key(&entity)
    }

    /// Number of slots the built buffer will have.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len() + 1
    }

    /// Always false: the root is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Add `entity` under `parent` with a local transform.
    ///
    /// # Errors
    ///
    /// Fails if `entity` was already added or `parent` is not in the hierarchy.
    pub fn add(
        &mut self,
        parent: Entity,
        entity: Entity,
        local: TransformQvvs,
        mirrors_parent: bool,
    ) -> Result<&mut Self, HierarchyError> {
        if self.contains(entity) {
            return Err(HierarchyError::DuplicateEntity(entity));
        }
        if !self.contains(parent) {
            return Err(HierarchyError::UnknownParent {
                child: entity,
                parent,
            });
        }

        self.pending.insert(
            entity,
            PendingNode {
                local,
                mirrors_parent,
            },
        );
        self.children.entry(parent).or_default().push(entity);
        Ok(self)
    }

    /// Add a child with just a local translation.
    ///
    /// # Errors
    ///
    /// See [`HierarchyBuilder::add`].
    pub fn add_at(
        &mut self,
        parent: Entity,
        entity: Entity,
        translation: Vec3,
    ) -> Result<&mut Self, HierarchyError> {
        self.add(
            parent,
            entity,
            TransformQvvs::from_translation(translation),
            false,
        )
    }

    /// Flatten into pre-order and compute every cached world transform.
    #[must_use]
    pub fn build(self) -> HierarchyBuffer {
        let mut nodes = Vec::with_capacity(self.len());
        nodes.push(HierarchyNode::root(self.root, self.root_transform));

        let mut stack: Vec<(Entity, usize)> = Vec::new();
        if let Some(children) = self.children.get(&self.root) {
            stack.extend(children.iter().rev().map(|&child| (child, 0)));
        }

        while let Some((entity, parent)) = stack.pop() {
            let pending = self.pending[&entity];
            let parent_world = nodes[parent].continuous.world;
            let world = if pending.mirrors_parent {
                parent_world
            } else {
                parent_world * pending.local
            };
            let cache = NodeCache {
                local: pending.local,
                world,
            };

            let index = nodes.len();
            nodes.push(HierarchyNode {
                entity,
                index,
                parent,
                mirrors_parent: pending.mirrors_parent,
                continuous: cache,
                ticked: cache,
            });

            if let Some(children) = self.children.get(&entity) {
                stack.extend(children.iter().rev().map(|&child| (child, index)));
            }
        }

        HierarchyBuffer {
            root: self.root,
            nodes,
        }
    }
}
