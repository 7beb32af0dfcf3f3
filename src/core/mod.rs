//! Core module
//!
//! Contains errors, configuration, scene loading and statistics

mod config;
pub mod debug;
mod error;
pub mod scene;

pub use config::PropagationConfig;
pub use debug::PropagationStats;
pub use error::HierarchyError;
pub use scene::{HierarchyScene, SceneNode};
