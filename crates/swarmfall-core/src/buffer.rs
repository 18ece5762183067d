//! Deferred mutation buffer and replay.
//!
//! Replay is the only place the population changes during a simulation. It
//! runs once per tick, after every pass has finished:
//!
//! 1. [`DeferredBuffer::drain_ordered`] concatenates the submitted writer
//!    channels in `(pass_order, writer)` order and stable-sorts the result by
//!    `(pass_order, local_seq)`. The order is a pure function of what was
//!    recorded, never of thread timing.
//! 2. [`replay`] applies the intents one at a time against the
//!    [`ComponentStore`].
//!
//! # Failure handling
//!
//! An intent that cannot be applied (stale handle, missing component,
//! unknown prefab, population cap) is dropped and listed in the
//! [`ReplayReport`]. Replay always runs to the end.
//!
//! # Visibility
//!
//! Intents were recorded against the pre-replay state, so none of them saw
//! another intent's effect. During replay each intent sees everything applied
//! before it, which is what lets a `SetComponent` target an entity whose
//! `Spawn` appeared earlier in the same replay.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::entity::Entity;
use crate::error::{KernelError, Result};
use crate::intent::{Intent, IntentKey, IntentWriter, PendingEntity, RecordedIntent, Target};
use crate::prefab::PrefabRegistry;
use crate::store::ComponentStore;

// =============================================================================
// Deferred Buffer
// =============================================================================

/// Collection point for the writer channels of one tick.
#[derive(Debug, Default)]
pub struct DeferredBuffer {
    channels: Vec<IntentWriter>,
}

impl DeferredBuffer {
    /// Empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand a finished writer channel to the buffer.
    pub fn submit(&mut self, writer: IntentWriter) {
        if !writer.is_empty() {
            self.channels.push(writer);
        }
    }

    /// Number of non-empty channels submitted.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Total number of recorded intents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.iter().map(IntentWriter::len).sum()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Empty the buffer, returning every intent in application order.
    pub fn drain_ordered(&mut self) -> Vec<RecordedIntent> {
        let mut channels = std::mem::take(&mut self.channels);
        channels.sort_by_key(|c| (c.pass_order(), c.writer_id()));

        let mut intents: Vec<_> = channels
            .into_iter()
            .flat_map(IntentWriter::into_intents)
            .collect();
        // Stable: equal merge keys keep writer order.
        intents.sort_by_key(|r| r.key.merge_key());
        intents
    }
}

impl Extend<IntentWriter> for DeferredBuffer {
    fn extend<I: IntoIterator<Item = IntentWriter>>(&mut self, iter: I) {
        for writer in iter {
            self.submit(writer);
        }
    }
}

// =============================================================================
// Replay
// =============================================================================

/// An intent replay could not apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedIntent {
    /// Key of the intent
    pub key: IntentKey,
    /// Intent kind, for logs
    pub label: &'static str,
    /// Why it was dropped
    pub error: KernelError,
}

/// Outcome of one replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Intents applied
    pub applied: usize,
    /// Intents dropped, in application order
    pub dropped: Vec<DroppedIntent>,
    /// Entities created, with the pending handle each resolves
    pub spawned: Vec<(PendingEntity, Entity)>,
    /// Entities removed
    pub destroyed: Vec<Entity>,
}

impl ReplayReport {
    /// The entity a pending handle became, if its spawn succeeded.
    #[must_use]
    pub fn resolve(&self, pending: PendingEntity) -> Option<Entity> {
        self.spawned
            .iter()
            .find(|(p, _)| *p == pending)
            .map(|(_, entity)| *entity)
    }

    /// Intents seen (applied + dropped).
    #[must_use]
    pub fn total(&self) -> usize {
        self.applied + self.dropped.len()
    }
}

/// Apply `intents` in order with no population cap.
pub fn replay(
    store: &mut ComponentStore,
    prefabs: &PrefabRegistry,
    intents: impl IntoIterator<Item = RecordedIntent>,
) -> ReplayReport {
    replay_capped(store, prefabs, intents, usize::MAX)
}

/// Apply `intents` in order, refusing spawns once `population_limit` entities
/// are alive.
pub fn replay_capped(
    store: &mut ComponentStore,
    prefabs: &PrefabRegistry,
    intents: impl IntoIterator<Item = RecordedIntent>,
    population_limit: usize,
) -> ReplayReport {
    let mut replayer = Replayer {
        store,
        prefabs,
        population_limit,
        pending: HashMap::new(),
        report: ReplayReport::default(),
    };

    for RecordedIntent { key, intent } in intents {
        let label = intent.label();
        match replayer.apply(key, intent) {
            Ok(()) => replayer.report.applied += 1,
            Err(error) => {
                match &error {
                    KernelError::UnknownPrefab { .. } | KernelError::PopulationLimit { .. } => {
                        warn!(%key, label, %error, "spawn dropped");
                    }
                    _ => debug!(%key, label, %error, "intent dropped"),
                }
                replayer
                    .report
                    .dropped
                    .push(DroppedIntent { key, label, error });
            }
        }
    }

    replayer.report
}

struct Replayer<'a> {
    store: &'a mut ComponentStore,
    prefabs: &'a PrefabRegistry,
    population_limit: usize,
    pending: HashMap<PendingEntity, Entity>,
    report: ReplayReport,
}

impl Replayer<'_> {
    fn apply(&mut self, key: IntentKey, intent: Intent) -> Result<()> {
        match intent {
            Intent::Spawn { prefab, components } => {
                let template = self.prefabs.get(prefab)?;
                if self.store.len() >= self.population_limit {
                    return Err(KernelError::PopulationLimit {
                        limit: self.population_limit,
                    });
                }

                let entity = self.store.create_entity();
                for value in template.components.iter().copied().chain(components) {
                    self.store.insert_value(entity, value)?;
                }

                let pending = PendingEntity::new(key);
                self.pending.insert(pending, entity);
                self.report.spawned.push((pending, entity));
                Ok(())
            }
            Intent::Destroy { target } => {
                let entity = self.resolve(target)?;
                self.store.destroy_entity(entity)?;
                self.report.destroyed.push(entity);
                Ok(())
            }
            Intent::SetComponent { target, value } => {
                let entity = self.resolve(target)?;
                self.store.set_value(entity, value)
            }
            Intent::AddComponent { target, value } => {
                let entity = self.resolve(target)?;
                self.store.insert_value(entity, value)
            }
            Intent::RemoveComponent { target, kind } => {
                let entity = self.resolve(target)?;
                self.store.remove_kind(entity, kind)
            }
        }
    }

    fn resolve(&self, target: Target) -> Result<Entity> {
        match target {
            Target::Live(entity) => Ok(entity),
            Target::Pending(pending) => {
                self.pending
                    .get(&pending)
                    .copied()
                    .ok_or_else(|| KernelError::UnresolvedPending {
                        pending: pending.to_string(),
                    })
            }
        }
    }
}
