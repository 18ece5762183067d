//! Entity handles.
//!
//! An [`Entity`] is a slot index plus a generation counter. The
//! [`ComponentStore`](crate::store::ComponentStore) reuses freed slots, and
//! bumps the generation every time it does, so a handle kept across a
//! destroy (a turret's current target, for example) can never alias the
//! entity that later occupies the same slot.
//!
//! # Example
//!
//! ```
//! use swarmfall_core::store::ComponentStore;
//!
//! let mut store = ComponentStore::new();
//! let first = store.create_entity();
//! store.destroy_entity(first).unwrap();
//!
//! let second = store.create_entity();
//! assert_eq!(first.index(), second.index());
//! assert_ne!(first, second);
//! assert!(!store.is_alive(first));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Generational handle to one simulated object.
///
/// # Ordering
///
/// Handles order by slot index first, which is the iteration order of every
/// snapshot and pass. Generation only breaks ties between a dead handle and
/// its replacement.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    /// Creates a handle from raw parts.
    ///
    /// Only the store hands out live handles; this is for tests and for
    /// reconstructing handles from logs.
    #[must_use]
    pub const fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index in the store's dense arrays.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when this handle was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Slot index as a `usize`.
    #[must_use]
    pub const fn slot(self) -> usize {
        self.index as usize
    }

    /// Packs the handle into a single `u64` (generation in the high half).
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

impl From<Entity> for u64 {
    fn from(entity: Entity) -> Self {
        entity.to_bits()
    }
}
