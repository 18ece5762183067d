//! Kernel error taxonomy.
//!
//! Every variant is recoverable at the point it is raised: stale handles and
//! unknown prefabs drop the offending intent, missing components surface as
//! an `Err` to the caller. [`KernelError::InvariantViolation`] is only ever
//! produced by debug-build pass registration checks.

use thiserror::Error;

use crate::component::ComponentKind;
use crate::entity::Entity;
use crate::prefab::PrefabId;

/// Errors raised by the store, the deferred buffer and the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    /// The handle's generation is stale or its slot was never issued.
    #[error("invalid entity handle {entity}")]
    InvalidHandle {
        /// The rejected handle
        entity: Entity,
    },

    /// The entity is alive but does not carry the requested kind.
    #[error("entity {entity} has no {kind} component")]
    ComponentMissing {
        /// Entity that was read
        entity: Entity,
        /// Kind that was missing
        kind: ComponentKind,
    },

    /// A spawn named a prefab that was never registered.
    #[error("unknown prefab {prefab}")]
    UnknownPrefab {
        /// The unregistered id
        prefab: PrefabId,
    },

    /// An intent targeted a pending entity whose spawn did not happen.
    #[error("pending entity {pending} was never spawned")]
    UnresolvedPending {
        /// Display form of the pending handle
        pending: String,
    },

    /// The population cap was reached.
    #[error("population limit of {limit} entities reached")]
    PopulationLimit {
        /// Configured cap
        limit: usize,
    },

    /// A pass broke its declared access contract.
    #[error("invariant violation: {detail}")]
    InvariantViolation {
        /// What was violated
        detail: String,
    },

    /// Two passes were registered under the same name.
    #[error("pass '{name}' is already registered")]
    DuplicatePass {
        /// The duplicated name
        name: String,
    },
}

impl KernelError {
    /// Shorthand for [`KernelError::InvariantViolation`].
    pub fn invariant(detail: impl Into<String>) -> Self {
        Self::InvariantViolation {
            detail: detail.into(),
        }
    }
}

/// Result alias used across the kernel.
pub type Result<T, E = KernelError> = std::result::Result<T, E>;
