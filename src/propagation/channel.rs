//! Continuous and ticked transform channels
//!
//! Each channel names the component it writes and the node cache it reads, so
//! the propagation engine is written once and instantiated per channel. The two
//! channels never read each other's data.

use crate::ecs::{HierarchyNode, NodeCache, TickedWorldTransform, WorldTransform, WorldTransformComponent};

/// A set of cached transforms that propagate together.
pub trait TransformChannel: Send + Sync + 'static {
    /// Component holding the entity's cached world transform
    type Component: WorldTransformComponent;

    /// Name used in logs
    const NAME: &'static str;

    /// The node cache this channel reads.
    fn cache(node: &HierarchyNode) -> &NodeCache;

    /// The node cache this channel writes.
    fn cache_mut(node: &mut HierarchyNode) -> &mut NodeCache;
}

/// World transforms updated whenever a write occurs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Continuous;

impl TransformChannel for Continuous {
    type Component = WorldTransform;

    const NAME: &'static str = "continuous";

    #[inline]
    fn cache(node: &HierarchyNode) -> &NodeCache {
        node.continuous()
    }

    #[inline]
    fn cache_mut(node: &mut HierarchyNode) -> &mut NodeCache {
        node.continuous_mut()
    }
}

/// Snapshot world transforms for fixed-interval consumers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ticked;

impl TransformChannel for Ticked {
    type Component = TickedWorldTransform;

    const NAME: &'static str = "ticked";

    #[inline]
    fn cache(node: &HierarchyNode) -> &NodeCache {
        node.ticked()
    }

    #[inline]
    fn cache_mut(node: &mut HierarchyNode) -> &mut NodeCache {
        node.ticked_mut()
    }
}
