//! Errors raised while building hierarchies and loading scenes or configuration
//!
//! Expected no-ops during propagation (mirror writes, dead descendants) are not
//! errors, and access-key mismatches are panics; neither appears here.

use hecs::Entity;

/// Errors that can occur while building or installing hierarchies
#[derive(Debug, Clone, PartialEq)]
pub enum HierarchyError {
    /// The entity was already added to the hierarchy
    DuplicateEntity(Entity),
    /// The declared parent is not part of the hierarchy being built
    UnknownParent {
        /// Entity being added
        child: Entity,
        /// Missing parent
        parent: Entity,
    },
    /// A root entity cannot mirror a parent it does not have
    MirrorRoot(Entity),
    /// A buffer slot breaks the pre-order contiguity invariant
    NotPreOrder {
        /// Offending slot
        index: usize,
    },
    /// A node's stored index disagrees with its position in the buffer
    IndexMismatch {
        /// Position in the buffer
        index: usize,
        /// Index stored on the node
        stored: usize,
    },
    /// The entity does not exist in the world
    MissingEntity(Entity),
    /// A scene entity points at a parent index outside the scene
    InvalidParentIndex {
        /// Scene entity index
        entity: usize,
        /// Declared parent index
        parent: usize,
    },
    /// A scene entity is not reachable from any root
    Cycle {
        /// Scene entity index
        entity: usize,
    },
    /// IO error
    IoError(String),
    /// Serialization error
    SerializeError(String),
    /// Deserialization error
    DeserializeError(String),
}

impl std::fmt::Display for HierarchyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateEntity(e) => write!(f, "entity {e:?} is already in the hierarchy"),
            Self::UnknownParent { child, parent } => {
                write!(f, "parent {parent:?} of {child:?} is not in the hierarchy")
            }
            Self::MirrorRoot(e) => write!(f, "root {e:?} cannot mirror a parent"),
            Self::NotPreOrder { index } => {
                write!(f, "hierarchy slot {index} breaks pre-order contiguity")
            }
            Self::IndexMismatch { index, stored } => {
                write!(f, "hierarchy slot {index} stores index {stored}")
            }
            Self::MissingEntity(e) => write!(f, "entity {e:?} does not exist"),
            Self::InvalidParentIndex { entity, parent } => {
                write!(f, "scene entity {entity} has out of range parent {parent}")
            }
            Self::Cycle { entity } => {
                write!(f, "scene entity {entity} is not reachable from any root")
            }
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::SerializeError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializeError(e) => write!(f, "Deserialization error: {e}"),
        }
    }
}

impl std::error::Error for HierarchyError {}
