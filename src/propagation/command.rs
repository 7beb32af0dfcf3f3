//! Transform write commands
//!
//! A write names both what to change and the payload to change it with. World
//! space commands are applied with [`apply_delta`]; setting the local transform
//! needs the parent's world transform and is resolved in [`TransformWrite::apply`].

use glam::{Quat, Vec3};

use crate::ecs::NodeCache;
use crate::math::TransformQvvs;

/// Kind of write, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteCommand {
    /// Overwrite the world transform
    WorldTransformSet,
    /// Overwrite the local transform
    LocalTransformSet,
    /// Multiply the world scale
    ScaleDelta,
    /// Overwrite the world stretch
    StretchSet,
    /// Add to the world translation
    TranslationDelta,
    /// Pre-multiply the world rotation
    RotationDelta,
}

/// A requested change to one entity's transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformWrite {
    /// Overwrite the world transform
    WorldTransform(TransformQvvs),
    /// Overwrite the local transform; world = parent.world * local
    LocalTransform(TransformQvvs),
    /// Multiply the world scale by a factor
    ScaleDelta(f32),
    /// Overwrite the world stretch, keeping translation, rotation and scale
    Stretch(Vec3),
    /// Add an offset to the world translation
    TranslationDelta(Vec3),
    /// Apply a rotation on top of the world rotation
    RotationDelta(Quat),
}

impl TransformWrite {
    /// The kind of this write.
    #[must_use]
    pub const fn kind(&self) -> WriteCommand {
        match self {
            Self::WorldTransform(_) => WriteCommand::WorldTransformSet,
            Self::LocalTransform(_) => WriteCommand::LocalTransformSet,
            Self::ScaleDelta(_) => WriteCommand::ScaleDelta,
            Self::Stretch(_) => WriteCommand::StretchSet,
            Self::TranslationDelta(_) => WriteCommand::TranslationDelta,
            Self::RotationDelta(_) => WriteCommand::RotationDelta,
        }
    }

    /// Apply this write to a node's cache.
    ///
    /// `parent_world` is `None` for a node without a parent, whose local and
    /// world transforms coincide. After a world-space write the local transform
    /// is re-derived from the parent so later propagation reproduces the new
    /// world transform; if the parent cannot be inverted the old local is kept.
    #[must_use]
    pub fn apply(&self, cache: NodeCache, parent_world: Option<TransformQvvs>) -> NodeCache {
        let Some(parent_world) = parent_world else {
            return NodeCache::unparented(apply_delta(cache.world, *self));
        };

        match *self {
            Self::LocalTransform(local) => NodeCache {
                local,
                world: parent_world * local,
            },
            _ => {
                let world = apply_delta(cache.world, *self);
                let local = world.relative_to(&parent_world).unwrap_or_else(|| {
                    log::debug!("degenerate parent transform, keeping previous local transform");
                    cache.local
                });
                NodeCache { local, world }
            }
        }
    }
}

/// Apply a write to a world transform.
///
/// For [`TransformWrite::LocalTransform`] this treats `current` as unparented,
/// so the payload simply replaces it.
#[must_use]
pub fn apply_delta(current: TransformQvvs, write: TransformWrite) -> TransformQvvs {
    match write {
        TransformWrite::WorldTransform(transform) | TransformWrite::LocalTransform(transform) => {
            transform
        }
        TransformWrite::ScaleDelta(factor) => TransformQvvs {
            scale: current.scale * factor,
            ..current
        },
        TransformWrite::Stretch(stretch) => TransformQvvs { stretch, ..current },
        TransformWrite::TranslationDelta(offset) => TransformQvvs {
            translation: current.translation + offset,
            ..current
        },
        TransformWrite::RotationDelta(rotation) => TransformQvvs {
            rotation: (rotation * current.rotation).normalize(),
            ..current
        },
    }
}
