//! Transform hierarchy propagation built on hecs
//!
//! This crate provides:
//! - QVVS transforms (translation, rotation, uniform scale, stretch)
//! - Pre-order flattened hierarchies owned by their root entity
//! - One propagation engine for the continuous and ticked caches
//! - Immediate, brokered and scoped parallel storage backends

pub mod core;
pub mod ecs;
pub mod math;
pub mod propagation;

// Re-exports for convenience
pub use glam;
pub use hecs;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::core::{HierarchyError, HierarchyScene, PropagationConfig, PropagationStats};
    pub use crate::ecs::{
        HierarchyBuffer, HierarchyBuilder, HierarchyHandle, Name, RootReference,
        TickedWorldTransform, World, WorldTransform,
    };
    pub use crate::math::TransformQvvs;
    pub use crate::propagation::{
        AccessKey, BrokerRequest, Continuous, PropagationReport, Ticked, TransformWrite,
        WriteStatus, par_write_transforms,
    };
    pub use glam::{Quat, Vec3};
}
