//! Access keys for scoped hierarchy writes
//!
//! An [`AccessKey`] is a capability token, not a lock. It names the one
//! hierarchy root its holder may mutate and is checked by equality wherever a
//! scoped write enters a hierarchy. Nothing stops two keys for the same root from
//! existing; keeping them off different threads at the same time is the caller's
//! obligation, which is why minting a key is `unsafe`.

use hecs::Entity;

/// Proof that the holder has exclusive write rights over one hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessKey {
    root: Entity,
}

impl AccessKey {
    /// Mint a key for `root`.
    ///
    /// # Safety
    ///
    /// While this key (or any copy of it) is used for writes, no other thread may
    /// read or write the hierarchy rooted at `root` through any other key or
    /// storage path. Keys for different roots may be used concurrently.
    #[must_use]
    pub const unsafe fn new(root: Entity) -> Self {
        Self { root }
    }

    /// Root this key is bound to.
    #[must_use]
    #[inline]
    pub const fn root(&self) -> Entity {
        self.root
    }

    /// Panics unless this key is bound to `root`.
    ///
    /// A mismatch means a caller is about to mutate a hierarchy it does not own,
    /// which would race with that hierarchy's own worker.
    #[inline]
    #[track_caller]
    pub fn validate(&self, root: Entity) {
        if self.root != root {
            panic!(
                "access key for hierarchy {:?} used to mutate hierarchy {:?}",
                self.root, root
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_matching_root() {
        let mut world = hecs::World::new();
        let root = world.spawn(());

        let key = unsafe { AccessKey::new(root) };
        key.validate(root);
        assert_eq!(key.root(), root);
    }

    #[test]
    #[should_panic(expected = "access key for hierarchy")]
    fn test_validate_mismatch_panics() {
        let mut world = hecs::World::new();
        let a = world.spawn(());
        let b = world.spawn(());

        let key = unsafe { AccessKey::new(a) };
        key.validate(b);
    }
}
