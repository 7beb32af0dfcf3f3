//! Transform propagation
//!
//! One engine, generic over the transform channel and over the storage it
//! writes through. Backends in [`backends`] adapt the world to the engine's
//! capabilities:
//!
//! | backend | entry point | threads |
//! |---|---|---|
//! | immediate | [`World::write_transform`](crate::ecs::World::write_transform) | caller only |
//! | brokered | [`ComponentBroker::write_transform`] | caller only |
//! | scoped | [`par_write_transforms`] | one worker per hierarchy |

mod access;
pub mod backends;
mod channel;
mod command;
mod engine;
mod key;

pub use access::{Liveness, WorldTransformAccess};
pub use backends::brokered::{BrokerRequest, ComponentBroker};
pub use backends::immediate::ImmediateAccess;
pub use backends::scoped::{ComponentLookup, ScopedAccess, par_write_transforms};
pub use channel::{Continuous, Ticked, TransformChannel};
pub use command::{TransformWrite, WriteCommand, apply_delta};
pub use engine::{PropagationReport, WriteStatus, write_and_propagate, write_standalone};
pub use key::AccessKey;
