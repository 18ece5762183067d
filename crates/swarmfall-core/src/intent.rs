//! Mutation intents and the writer channels that record them.
//!
//! Passes never change the population directly. They record [`Intent`]s into
//! a private [`IntentWriter`], and the scheduler replays every writer's
//! intents once, at the end of the tick (see [`crate::buffer`]).
//!
//! # Keys
//!
//! Each intent gets an [`IntentKey`] at record time: the recording pass's
//! position in the schedule, the writer id, and a per-writer sequence number
//! starting at 1. Keys are unique within a tick and are what replay sorts on.
//!
//! # Pending entities
//!
//! A spawn returns a [`PendingEntity`] naming the entity that replay will
//! create. The same writer can target it with later intents; replay resolves
//! it once the spawn has been applied.
//!
//! # Example
//!
//! ```
//! use glam::Vec3;
//! use swarmfall_core::component::{ComponentValue, Transform, Velocity};
//! use swarmfall_core::intent::{Intent, IntentWriter, Target};
//! use swarmfall_core::prefab::PrefabId;
//!
//! let mut writer = IntentWriter::new(2, 17);
//! let shot = writer.spawn(PrefabId::new("shot"), [ComponentValue::from(Transform::at(Vec3::ZERO))]);
//! writer.set(shot, Velocity { direction: Vec3::Z, speed: 40.0 });
//!
//! assert_eq!(writer.len(), 2);
//! let recorded = writer.intents();
//! assert_eq!(recorded[0].key.local_seq, 1);
//! assert_eq!(recorded[1].key.local_seq, 2);
//! assert!(matches!(
//!     recorded[1].intent,
//!     Intent::SetComponent { target: Target::Pending(p), .. } if p == shot
//! ));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::component::{ComponentKind, ComponentValue, PendingDestroy};
use crate::entity::Entity;
use crate::prefab::PrefabId;

// =============================================================================
// Keys and Targets
// =============================================================================

/// Where and when an intent was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntentKey {
    /// Position of the recording pass in the schedule (0 for the host)
    pub pass_order: u32,
    /// Writer channel id within the pass
    pub writer: u32,
    /// Per-writer sequence number, starting at 1
    pub local_seq: u32,
}

impl IntentKey {
    /// The key replay sorts on.
    #[must_use]
    pub const fn merge_key(&self) -> (u32, u32) {
        (self.pass_order, self.local_seq)
    }
}

impl fmt::Display for IntentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}:w{}#{}", self.pass_order, self.writer, self.local_seq)
    }
}

/// An entity that will exist once its spawn intent is replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PendingEntity(IntentKey);

impl PendingEntity {
    pub(crate) const fn new(key: IntentKey) -> Self {
        Self(key)
    }

    /// Key of the spawn intent that creates this entity.
    #[must_use]
    pub const fn key(self) -> IntentKey {
        self.0
    }
}

impl fmt::Display for PendingEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pending({})", self.0)
    }
}

/// Entity an intent applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// An entity that existed when the intent was recorded
    Live(Entity),
    /// An entity spawned earlier by the same writer
    Pending(PendingEntity),
}

impl From<Entity> for Target {
    fn from(entity: Entity) -> Self {
        Self::Live(entity)
    }
}

impl From<PendingEntity> for Target {
    fn from(pending: PendingEntity) -> Self {
        Self::Pending(pending)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live(entity) => write!(f, "{entity}"),
            Self::Pending(pending) => write!(f, "{pending}"),
        }
    }
}

// =============================================================================
// Intent
// =============================================================================

/// A requested structural change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Intent {
    /// Create an entity from a prefab, then apply `components` on top
    Spawn {
        /// Template to instantiate
        prefab: PrefabId,
        /// Records applied after the prefab's own
        components: Vec<ComponentValue>,
    },
    /// Remove an entity immediately at replay
    Destroy {
        /// Entity to remove
        target: Target,
    },
    /// Overwrite a component the entity already has
    SetComponent {
        /// Entity to modify
        target: Target,
        /// New record
        value: ComponentValue,
    },
    /// Add a component, or overwrite it if present
    AddComponent {
        /// Entity to modify
        target: Target,
        /// Record to add
        value: ComponentValue,
    },
    /// Remove a component
    RemoveComponent {
        /// Entity to modify
        target: Target,
        /// Kind to remove
        kind: ComponentKind,
    },
}

impl Intent {
    /// Short name for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "spawn",
            Self::Destroy { .. } => "destroy",
            Self::SetComponent { .. } => "set",
            Self::AddComponent { .. } => "add",
            Self::RemoveComponent { .. } => "remove",
        }
    }
}

/// An intent together with its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedIntent {
    /// Record-time key
    pub key: IntentKey,
    /// The change
    pub intent: Intent,
}

// =============================================================================
// Intent Writer
// =============================================================================

/// A private, append-only intent channel.
///
/// Each unit of parallel work owns one writer, so recording never contends.
/// Writers also carry a scalar tally that a pass can sum across its entities
/// (see [`Pass::complete`](crate::pass::Pass::complete)).
#[derive(Debug, Clone, Default)]
pub struct IntentWriter {
    pass_order: u32,
    writer: u32,
    next_seq: u32,
    intents: Vec<RecordedIntent>,
    tally: u64,
}

impl IntentWriter {
    /// A fresh channel for one writer of one pass.
    #[must_use]
    pub fn new(pass_order: u32, writer: u32) -> Self {
        Self {
            pass_order,
            writer,
            ..Default::default()
        }
    }

    fn record(&mut self, intent: Intent) -> IntentKey {
        self.next_seq += 1;
        let key = IntentKey {
            pass_order: self.pass_order,
            writer: self.writer,
            local_seq: self.next_seq,
        };
        self.intents.push(RecordedIntent { key, intent });
        key
    }

    /// Request a new entity from `prefab`, with `components` applied on top.
    pub fn spawn(
        &mut self,
        prefab: PrefabId,
        components: impl IntoIterator<Item = ComponentValue>,
    ) -> PendingEntity {
        PendingEntity::new(self.record(Intent::Spawn {
            prefab,
            components: components.into_iter().collect(),
        }))
    }

    /// Two-phase destroy: mark the entity, removal follows a tick later.
    pub fn destroy(&mut self, target: impl Into<Target>) {
        self.add(target, PendingDestroy::default());
    }

    /// Remove the entity at this tick's replay, skipping the marking phase.
    pub fn despawn(&mut self, target: impl Into<Target>) {
        self.record(Intent::Destroy {
            target: target.into(),
        });
    }

    /// Overwrite an existing component.
    pub fn set(&mut self, target: impl Into<Target>, value: impl Into<ComponentValue>) {
        self.record(Intent::SetComponent {
            target: target.into(),
            value: value.into(),
        });
    }

    /// Add or overwrite a component.
    pub fn add(&mut self, target: impl Into<Target>, value: impl Into<ComponentValue>) {
        self.record(Intent::AddComponent {
            target: target.into(),
            value: value.into(),
        });
    }

    /// Remove a component.
    pub fn remove(&mut self, target: impl Into<Target>, kind: ComponentKind) {
        self.record(Intent::RemoveComponent {
            target: target.into(),
            kind,
        });
    }

    /// Add to this writer's scalar tally.
    pub fn tally(&mut self, amount: u64) {
        self.tally += amount;
    }

    /// Current tally.
    #[must_use]
    pub fn tally_total(&self) -> u64 {
        self.tally
    }

    /// Schedule position of the owning pass.
    #[must_use]
    pub fn pass_order(&self) -> u32 {
        self.pass_order
    }

    /// Writer id.
    #[must_use]
    pub fn writer_id(&self) -> u32 {
        self.writer
    }

    /// Number of recorded intents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intents.len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// Recorded intents in record order.
    #[must_use]
    pub fn intents(&self) -> &[RecordedIntent] {
        &self.intents
    }

    /// Drop everything recorded so far (the tally included).
    pub fn discard(&mut self) {
        self.intents.clear();
        self.tally = 0;
    }

    pub(crate) fn into_intents(self) -> Vec<RecordedIntent> {
        self.intents
    }
}
