//! Scene serialization and deserialization
//!
//! Describes entity hierarchies as a flat node list with parent indices, in RON
//! (Rusty Object Notation) or JSON, and spawns them into a [`World`].

use std::fs;
use std::path::Path;

use hecs::Entity;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::HierarchyError;
use crate::ecs::{HierarchyBuilder, Name, TickedWorldTransform, World, WorldTransform};
use crate::math::TransformQvvs;

/// A serializable hierarchy member
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    /// Optional entity name
    #[serde(default)]
    pub name: Option<String>,
    /// Local transform; world transform for roots
    #[serde(default)]
    pub transform: TransformQvvs,
    /// Parent node index, `None` for roots
    #[serde(default)]
    pub parent: Option<usize>,
    /// Always take the parent's world transform
    #[serde(default)]
    pub mirrors_parent: bool,
}

/// A serializable scene of hierarchies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyScene {
    /// Scene name
    pub name: String,
    /// Scene version for compatibility
    pub version: u32,
    /// All nodes in the scene
    pub nodes: Vec<SceneNode>,
}

impl HierarchyScene {
    /// Create a new empty scene
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 1,
            nodes: Vec::new(),
        }
    }

    /// Add a node to the scene
    pub fn add_node(&mut self, node: SceneNode) -> usize {
        let index = self.nodes.len();
        self.nodes.push(node);
        index
    }

    /// Add a root node
    pub fn add_root(&mut self, name: impl Into<String>, transform: TransformQvvs) -> usize {
        self.add_node(SceneNode {
            name: Some(name.into()),
            transform,
            ..Default::default()
        })
    }

    /// Add a child node with a local transform
    pub fn add_child(&mut self, parent: usize, name: impl Into<String>, local: TransformQvvs) -> usize {
        self.add_node(SceneNode {
            name: Some(name.into()),
            transform: local,
            parent: Some(parent),
            mirrors_parent: false,
        })
    }

    /// Add a child node that mirrors its parent
    pub fn add_mirror(&mut self, parent: usize, name: impl Into<String>) -> usize {
        self.add_node(SceneNode {
            name: Some(name.into()),
            transform: TransformQvvs::IDENTITY,
            parent: Some(parent),
            mirrors_parent: true,
        })
    }

    /// Get the number of nodes
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the scene is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Spawn every node and install one hierarchy per root with children.
    ///
    /// Roots without children become standalone entities carrying only their
    /// world transform. Returns the spawned entity of each node, by node index.
    ///
    /// # Errors
    ///
    /// Fails before spawning anything if a parent index is out of range or a
    /// node cannot be reached from any root.
    pub fn spawn_into(&self, world: &mut World) -> Result<Vec<Entity>, HierarchyError> {
        let children = self.children()?;

        let entities: Vec<Entity> = self
            .nodes
            .iter()
            .map(|node| match &node.name {
                Some(name) => world.spawn((Name::new(name.clone()),)),
                None => world.spawn(()),
            })
            .collect();

        for (index, node) in self.nodes.iter().enumerate() {
            if node.parent.is_some() {
                continue;
            }
            if node.mirrors_parent {
                log::warn!("scene root {} cannot mirror a parent, flag ignored", index);
            }

            let root = entities[index];
            if children[index].is_empty() {
                world
                    .inner
                    .insert_one(root, WorldTransform(node.transform))
                    .map_err(|_| HierarchyError::MissingEntity(root))?;
                if world.config().track_ticked {
                    world
                        .inner
                        .insert_one(root, TickedWorldTransform(node.transform))
                        .map_err(|_| HierarchyError::MissingEntity(root))?;
                }
                continue;
            }

            let mut builder = HierarchyBuilder::new(root, node.transform);
            let mut stack: Vec<usize> = children[index].iter().rev().copied().collect();
            while let Some(child) = stack.pop() {
                let scene_node = &self.nodes[child];
                let parent = scene_node.parent.unwrap_or(index);
                builder.add(
                    entities[parent],
                    entities[child],
                    scene_node.transform,
                    scene_node.mirrors_parent,
                )?;
                stack.extend(children[child].iter().rev().copied());
            }
            world.insert_hierarchy(builder.build())?;
        }

        log::debug!("spawned scene '{}' with {} nodes", self.name, self.nodes.len());
        Ok(entities)
    }

    /// Child lists per node, after checking every node hangs off a root.
    fn children(&self) -> Result<Vec<SmallVec<[usize; 8]>>, HierarchyError> {
        let mut children: Vec<SmallVec<[usize; 8]>> = vec![SmallVec::new(); self.nodes.len()];
        for (index, node) in self.nodes.iter().enumerate() {
            if let Some(parent) = node.parent {
                if parent >= self.nodes.len() || parent == index {
                    return Err(HierarchyError::InvalidParentIndex {
                        entity: index,
                        parent,
                    });
                }
                children[parent].push(index);
            }
        }

        let mut reached = vec![false; self.nodes.len()];
        let mut stack: Vec<usize> = (0..self.nodes.len())
            .filter(|&index| self.nodes[index].parent.is_none())
            .collect();
        while let Some(index) = stack.pop() {
            reached[index] = true;
            stack.extend(children[index].iter().copied());
        }

        match reached.iter().position(|&reached| !reached) {
            Some(entity) => Err(HierarchyError::Cycle { entity }),
            None => Ok(children),
        }
    }

    /// Save the scene to a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_ron(&self, path: impl AsRef<Path>) -> Result<(), HierarchyError> {
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| HierarchyError::SerializeError(e.to_string()))?;
        fs::write(path, ron_string).map_err(|e| HierarchyError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Load a scene from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, HierarchyError> {
        let content =
            fs::read_to_string(path).map_err(|e| HierarchyError::IoError(e.to_string()))?;
        ron::from_str(&content).map_err(|e| HierarchyError::DeserializeError(e.to_string()))
    }

    /// Save the scene to a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), HierarchyError> {
        let json_string = serde_json::to_string_pretty(self)
            .map_err(|e| HierarchyError::SerializeError(e.to_string()))?;
        fs::write(path, json_string).map_err(|e| HierarchyError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Load a scene from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, HierarchyError> {
        let content =
            fs::read_to_string(path).map_err(|e| HierarchyError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| HierarchyError::DeserializeError(e.to_string()))
    }
}

impl Default for HierarchyScene {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::RootReference;
    use crate::propagation::Continuous;
    use glam::Vec3;

    fn arm() -> HierarchyScene {
        let mut scene = HierarchyScene::new("Arm");
        let root = scene.add_root("base", TransformQvvs::from_translation(Vec3::new(0.0, 1.0, 0.0)));
        let upper = scene.add_child(root, "upper", TransformQvvs::from_translation(Vec3::X));
        scene.add_child(upper, "hand", TransformQvvs::from_translation(Vec3::X).with_scale(0.5));
        scene.add_mirror(upper, "socket");
        scene.add_root("lamp", TransformQvvs::from_translation(Vec3::splat(3.0)));
        scene
    }

    #[test]
    fn test_scene_serialization_ron() {
        let scene = arm();

        let ron_str =
            ron::ser::to_string_pretty(&scene, ron::ser::PrettyConfig::default()).unwrap();
        assert!(ron_str.contains("socket"));

        let loaded: HierarchyScene = ron::from_str(&ron_str).unwrap();
        assert_eq!(loaded, scene);
    }

    #[test]
    fn test_scene_serialization_json() {
        let scene = arm();

        let json_str = serde_json::to_string(&scene).unwrap();
        let loaded: HierarchyScene = serde_json::from_str(&json_str).unwrap();
        assert_eq!(loaded.node_count(), 5);
        assert!(loaded.nodes[3].mirrors_parent);
    }

    #[test]
    fn test_scene_ron_defaults() {
        let scene: HierarchyScene = ron::from_str(
            "(name: \"Mini\", version: 1, nodes: [(name: Some(\"r\")), (parent: Some(0))])",
        )
        .unwrap();
        assert_eq!(scene.nodes[1].transform, TransformQvvs::IDENTITY);
        assert!(!scene.nodes[1].mirrors_parent);
    }

    #[test]
    fn test_spawn_into() {
        let mut world = World::new();
        let entities = arm().spawn_into(&mut world).unwrap();
        let [base, upper, hand, socket, lamp] = entities[..] else {
            panic!("expected five entities");
        };

        assert_eq!(world.hierarchy(base).unwrap().len(), 4);
        assert_eq!(world.get::<RootReference>(hand).unwrap().root, base);
        assert_eq!(&world.get::<Name>(hand).unwrap().0, "hand");

        let hand_world = world.world_transform::<Continuous>(hand).unwrap();
        assert_eq!(hand_world.translation, Vec3::new(2.0, 1.0, 0.0));
        assert_eq!(hand_world.scale, 0.5);
        assert_eq!(
            world.world_transform::<Continuous>(socket),
            world.world_transform::<Continuous>(upper)
        );

        assert!(world.hierarchy(lamp).is_none());
        assert_eq!(
            world.world_transform::<Continuous>(lamp).unwrap().translation,
            Vec3::splat(3.0)
        );
        assert_eq!(world.resolve(lamp), None);
    }

    #[test]
    fn test_spawn_rejects_bad_parent() {
        let mut scene = HierarchyScene::new("Bad");
        scene.add_root("r", TransformQvvs::IDENTITY);
        scene.add_child(7, "lost", TransformQvvs::IDENTITY);

        let mut world = World::new();
        assert_eq!(
            scene.spawn_into(&mut world),
            Err(HierarchyError::InvalidParentIndex {
                entity: 1,
                parent: 7
            })
        );
        assert!(world.is_empty());
    }

    #[test]
    fn test_spawn_rejects_cycle() {
        let mut scene = HierarchyScene::new("Loop");
        scene.add_root("r", TransformQvvs::IDENTITY);
        scene.add_child(2, "a", TransformQvvs::IDENTITY);
        scene.add_child(1, "b", TransformQvvs::IDENTITY);

        let mut world = World::new();
        assert_eq!(
            scene.spawn_into(&mut world),
            Err(HierarchyError::Cycle { entity: 1 })
        );
    }
}
