//! Entity Component System module
//!
//! Built on top of the hecs ECS library

mod components;
mod handle;
mod hierarchy;
mod world;

pub use components::{
    Name, RootReference, TickedWorldTransform, WorldTransform, WorldTransformComponent,
};
pub use handle::{BufferSource, HierarchyHandle, HierarchyLookup, resolve};
pub use hierarchy::{
    CleanupBuffer, HierarchyBuffer, HierarchyBuilder, HierarchyNode, NO_PARENT, NodeCache,
};
pub use world::{FrameMaintenance, World};
