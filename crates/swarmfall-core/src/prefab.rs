//! Prefab templates.
//!
//! A prefab is a named list of component records. Spawning a prefab creates
//! an entity carrying a copy of every record, after which the spawn's own
//! initial components are applied on top (overriding any of the same kind).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::component::ComponentValue;
use crate::error::{KernelError, Result};

/// Stable identifier of a prefab, derived from its name.
///
/// The id is the 64-bit FNV-1a hash of the name, so it is `Copy`, can be
/// computed in `const` context and can live inside component records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrefabId(u64);

impl PrefabId {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    /// Id for a prefab name.
    #[must_use]
    pub const fn new(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Raw hash value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PrefabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prefab:{:016x}", self.0)
    }
}

impl From<&str> for PrefabId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A named component template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prefab {
    /// Registered name
    pub name: String,
    /// Records copied onto every spawned instance
    pub components: Vec<ComponentValue>,
}

impl Prefab {
    /// Empty prefab.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: Vec::new(),
        }
    }

    /// Builder: add a record to the template.
    #[must_use]
    pub fn with(mut self, component: impl Into<ComponentValue>) -> Self {
        self.components.push(component.into());
        self
    }

    /// Id derived from the name.
    #[must_use]
    pub fn id(&self) -> PrefabId {
        PrefabId::new(&self.name)
    }
}

/// All prefabs known to a simulation.
#[derive(Debug, Clone, Default)]
pub struct PrefabRegistry {
    prefabs: HashMap<PrefabId, Prefab>,
}

impl PrefabRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prefab, returning the one it replaced.
    pub fn register(&mut self, prefab: Prefab) -> Option<Prefab> {
        self.prefabs.insert(prefab.id(), prefab)
    }

    /// Look up a prefab.
    ///
    /// # Errors
    ///
    /// [`KernelError::UnknownPrefab`] if the id was never registered.
    pub fn get(&self, id: PrefabId) -> Result<&Prefab> {
        self.prefabs
            .get(&id)
            .ok_or(KernelError::UnknownPrefab { prefab: id })
    }

    /// Whether the id is registered.
    #[must_use]
    pub fn contains(&self, id: PrefabId) -> bool {
        self.prefabs.contains_key(&id)
    }

    /// Number of registered prefabs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prefabs.len()
    }

    /// Whether no prefab is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefabs.is_empty()
    }
}

impl Extend<Prefab> for PrefabRegistry {
    fn extend<I: IntoIterator<Item = Prefab>>(&mut self, iter: I) {
        for prefab in iter {
            self.register(prefab);
        }
    }
}
