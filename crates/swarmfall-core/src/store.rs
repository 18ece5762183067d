//! Component store.
//!
//! The store owns every entity and every component record. Records live in
//! one dense column per [`ComponentKind`], indexed by entity slot, so
//! iterating a kind touches contiguous memory and needs no per-entity lookup.
//!
//! # Slots and generations
//!
//! Destroyed slots go on a free list and are reused by later spawns. Each
//! reuse bumps the slot's generation, and every operation that takes an
//! [`Entity`] checks the generation first, failing with
//! [`KernelError::InvalidHandle`] on a stale handle.
//!
//! # Mutation discipline
//!
//! During a tick the store is read-only for passes, with one exception: the
//! kind a pass drives is moved out of the store for the pass's duration and
//! handed to it mutably (see [`Pass`](crate::pass::Pass)). Everything else
//! changes only when the deferred buffer is replayed at the end of the tick.
//!
//! # Example
//!
//! ```
//! use glam::Vec3;
//! use swarmfall_core::component::{ComponentKind, Targetable, Transform};
//! use swarmfall_core::store::ComponentStore;
//!
//! let mut store = ComponentStore::new();
//! let rock = store.create_entity();
//! store.insert(rock, Transform::at(Vec3::new(1.0, 2.0, 3.0))).unwrap();
//!
//! assert_eq!(store.get::<Transform>(rock).unwrap().position.z, 3.0);
//! assert!(store.has(rock, ComponentKind::Transform));
//! assert!(store.get::<Targetable>(rock).is_err());
//!
//! let snapshot = store.snapshot::<Transform>();
//! assert_eq!(snapshot.len(), 1);
//! assert_eq!(snapshot.entities().next(), Some(rock));
//! ```

use std::sync::Arc;

use quadrant::SpatialGrid;
use rayon::prelude::*;

use crate::component::{
    CellAssignment, Component, ComponentKind, ComponentMask, ComponentValue, Explosion, Fortress,
    PendingDestroy, Projectile, Swarmer, Targetable, Transform, Turret, Velocity,
};
use crate::entity::Entity;
use crate::error::{KernelError, Result};

/// Expands `$body` with `$t` bound to the record type of `$kind`.
macro_rules! with_component_type {
    ($kind:expr, $t:ident => $body:expr) => {
        match $kind {
            ComponentKind::Transform => {
                type $t = Transform;
                $body
            }
            ComponentKind::Velocity => {
                type $t = Velocity;
                $body
            }
            ComponentKind::CellAssignment => {
                type $t = CellAssignment;
                $body
            }
            ComponentKind::Targetable => {
                type $t = Targetable;
                $body
            }
            ComponentKind::Projectile => {
                type $t = Projectile;
                $body
            }
            ComponentKind::Explosion => {
                type $t = Explosion;
                $body
            }
            ComponentKind::Turret => {
                type $t = Turret;
                $body
            }
            ComponentKind::Swarmer => {
                type $t = Swarmer;
                $body
            }
            ComponentKind::Fortress => {
                type $t = Fortress;
                $body
            }
            ComponentKind::PendingDestroy => {
                type $t = PendingDestroy;
                $body
            }
        }
    };
}

/// Expands `$body` with `$v` bound to the record inside `$value`.
macro_rules! with_component_value {
    ($value:expr, $v:ident => $body:expr) => {
        match $value {
            ComponentValue::Transform($v) => $body,
            ComponentValue::Velocity($v) => $body,
            ComponentValue::CellAssignment($v) => $body,
            ComponentValue::Targetable($v) => $body,
            ComponentValue::Projectile($v) => $body,
            ComponentValue::Explosion($v) => $body,
            ComponentValue::Turret($v) => $body,
            ComponentValue::Swarmer($v) => $body,
            ComponentValue::Fortress($v) => $body,
            ComponentValue::PendingDestroy($v) => $body,
        }
    };
}

// =============================================================================
// Columns
// =============================================================================

/// Dense per-slot storage for one component kind.
#[derive(Debug, Clone)]
pub struct Column<T> {
    data: Vec<Option<T>>,
}

impl<T> Default for Column<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

impl<T: Copy> Column<T> {
    fn get(&self, slot: usize) -> Option<&T> {
        self.data.get(slot)?.as_ref()
    }

    fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.data.get_mut(slot)?.as_mut()
    }

    fn put(&mut self, slot: usize, value: T) -> Option<T> {
        if slot >= self.data.len() {
            self.data.resize_with(slot + 1, || None);
        }
        self.data[slot].replace(value)
    }

    fn clear(&mut self, slot: usize) -> Option<T> {
        self.data.get_mut(slot)?.take()
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [Option<T>] {
        &mut self.data
    }
}

/// One column per component kind.
#[derive(Debug, Clone, Default)]
pub struct Columns {
    pub(crate) transform: Column<Transform>,
    pub(crate) velocity: Column<Velocity>,
    pub(crate) cell: Column<CellAssignment>,
    pub(crate) targetable: Column<Targetable>,
    pub(crate) projectile: Column<Projectile>,
    pub(crate) explosion: Column<Explosion>,
    pub(crate) turret: Column<Turret>,
    pub(crate) swarmer: Column<Swarmer>,
    pub(crate) fortress: Column<Fortress>,
    pub(crate) pending_destroy: Column<PendingDestroy>,
}

// =============================================================================
// Snapshot
// =============================================================================

/// Immutable, slot-ordered copy of one component kind.
///
/// Cloning is cheap (reference counted), so a snapshot can be shared by every
/// worker thread of a pass.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    items: Arc<[(Entity, T)]>,
}

impl<T> Snapshot<T> {
    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All records in slot order.
    #[must_use]
    pub fn as_slice(&self) -> &[(Entity, T)] {
        &self.items
    }

    /// Iterate `(entity, record)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &(Entity, T)> {
        self.items.iter()
    }

    /// Iterate the entities in slot order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.items.iter().map(|(entity, _)| *entity)
    }

    /// Record of one entity, if it is in the snapshot.
    #[must_use]
    pub fn find(&self, entity: Entity) -> Option<&T> {
        self.items
            .binary_search_by(|(e, _)| e.cmp(&entity))
            .ok()
            .map(|i| &self.items[i].1)
    }
}

impl<T> FromIterator<(Entity, T)> for Snapshot<T> {
    fn from_iter<I: IntoIterator<Item = (Entity, T)>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// Component Store
// =============================================================================

/// Owner of all entity data.
#[derive(Debug, Clone, Default)]
pub struct ComponentStore {
    /// Current generation of each slot.
    generations: Vec<u32>,
    /// Whether each slot currently holds a live entity.
    alive: Vec<bool>,
    /// Kinds present on each slot.
    masks: Vec<ComponentMask>,
    /// Freed slots, reused last-in first-out.
    free: Vec<u32>,
    /// Number of live entities.
    live: usize,
    columns: Columns,
}

impl ComponentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Lifecycle =====

    /// Creates an entity with no components.
    ///
    /// Reuses a freed slot when one is available.
    pub fn create_entity(&mut self) -> Entity {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = index as usize;
            self.alive[slot] = true;
            self.masks[slot] = ComponentMask::empty();
            return Entity::from_raw(index, self.generations[slot]);
        }

        // Slot count never approaches u32::MAX; the population cap is far lower.
        #[allow(clippy::cast_possible_truncation)]
        let index = self.generations.len() as u32;
        self.generations.push(0);
        self.alive.push(true);
        self.masks.push(ComponentMask::empty());
        Entity::from_raw(index, 0)
    }

    /// Destroys an entity and all its components.
    ///
    /// # Errors
    ///
    /// [`KernelError::InvalidHandle`] if the handle is stale.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<()> {
        let slot = self.validate(entity)?;
        for kind in self.masks[slot].kinds() {
            with_component_type!(kind, T => {
                T::column_mut(&mut self.columns).clear(slot);
            });
        }
        self.masks[slot] = ComponentMask::empty();
        self.alive[slot] = false;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free.push(entity.index());
        self.live -= 1;
        Ok(())
    }

    /// Whether the handle refers to a live entity.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.validate(entity).is_ok()
    }

    fn validate(&self, entity: Entity) -> Result<usize> {
        let slot = entity.slot();
        if self.alive.get(slot).copied().unwrap_or(false)
            && self.generations[slot] == entity.generation()
        {
            Ok(slot)
        } else {
            Err(KernelError::InvalidHandle { entity })
        }
    }

    /// The live entity in a slot, if any.
    #[must_use]
    pub fn entity_at(&self, slot: usize) -> Option<Entity> {
        if *self.alive.get(slot)? {
            let index = u32::try_from(slot).ok()?;
            Some(Entity::from_raw(index, self.generations[slot]))
        } else {
            None
        }
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether there are no live entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots ever allocated (live or free).
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.generations.len()
    }

    /// Live entities in slot order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        (0..self.slot_count()).filter_map(|slot| self.entity_at(slot))
    }

    // ===== Presence =====

    /// Kinds carried by an entity.
    ///
    /// # Errors
    ///
    /// [`KernelError::InvalidHandle`] if the handle is stale.
    pub fn mask(&self, entity: Entity) -> Result<ComponentMask> {
        let slot = self.validate(entity)?;
        Ok(self.masks[slot])
    }

    /// Whether a live entity carries `kind`. False for stale handles.
    #[must_use]
    pub fn has(&self, entity: Entity, kind: ComponentKind) -> bool {
        self.mask(entity)
            .is_ok_and(|mask| mask.contains(kind.mask()))
    }

    /// Number of live entities carrying `kind`.
    #[must_use]
    pub fn count(&self, kind: ComponentKind) -> usize {
        self.masks
            .iter()
            .filter(|mask| mask.contains(kind.mask()))
            .count()
    }

    // ===== Typed access =====

    /// Read a component.
    ///
    /// # Errors
    ///
    /// - [`KernelError::InvalidHandle`] if the handle is stale
    /// - [`KernelError::ComponentMissing`] if the entity lacks `T`
    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T> {
        let slot = self.validate(entity)?;
        T::column(&self.columns)
            .get(slot)
            .ok_or(KernelError::ComponentMissing {
                entity,
                kind: T::KIND,
            })
    }

    /// Mutably borrow a component.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T> {
        let slot = self.validate(entity)?;
        T::column_mut(&mut self.columns)
            .get_mut(slot)
            .ok_or(KernelError::ComponentMissing {
                entity,
                kind: T::KIND,
            })
    }

    /// Overwrite a component the entity already has.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn set<T: Component>(&mut self, entity: Entity, value: T) -> Result<()> {
        *self.get_mut::<T>(entity)? = value;
        Ok(())
    }

    /// Add a component, or overwrite it if present. Returns the old record.
    ///
    /// # Errors
    ///
    /// [`KernelError::InvalidHandle`] if the handle is stale.
    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) -> Result<Option<T>> {
        let slot = self.validate(entity)?;
        self.masks[slot].insert(T::KIND.mask());
        Ok(T::column_mut(&mut self.columns).put(slot, value))
    }

    /// Remove a component, returning it.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<T> {
        let slot = self.validate(entity)?;
        let removed = T::column_mut(&mut self.columns)
            .clear(slot)
            .ok_or(KernelError::ComponentMissing {
                entity,
                kind: T::KIND,
            })?;
        self.masks[slot].remove(T::KIND.mask());
        Ok(removed)
    }

    /// Iterate `(entity, record)` for every live entity carrying `T`.
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        T::column(&self.columns)
            .data
            .iter()
            .enumerate()
            .filter_map(move |(slot, value)| Some((self.entity_at(slot)?, value.as_ref()?)))
    }

    /// Immutable, slot-ordered copy of every `T` record.
    #[must_use]
    pub fn snapshot<T: Component>(&self) -> Snapshot<T> {
        self.iter::<T>().map(|(entity, value)| (entity, *value)).collect()
    }

    // ===== Dynamic access =====

    /// Read a component of a kind known only at runtime.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn read_value(&self, entity: Entity, kind: ComponentKind) -> Result<ComponentValue> {
        with_component_type!(kind, T => self.get::<T>(entity).map(|v| T::into_value(*v)))
    }

    /// Dynamic [`insert`](Self::insert).
    ///
    /// # Errors
    ///
    /// [`KernelError::InvalidHandle`] if the handle is stale.
    pub fn insert_value(&mut self, entity: Entity, value: ComponentValue) -> Result<()> {
        with_component_value!(value, v => self.insert(entity, v).map(drop))
    }

    /// Dynamic [`set`](Self::set).
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn set_value(&mut self, entity: Entity, value: ComponentValue) -> Result<()> {
        with_component_value!(value, v => self.set(entity, v))
    }

    /// Dynamic [`remove`](Self::remove).
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn remove_kind(&mut self, entity: Entity, kind: ComponentKind) -> Result<()> {
        with_component_type!(kind, T => self.remove::<T>(entity).map(drop))
    }

    // ===== Scheduler support =====

    /// Recompute the cell of every entity whose refresh mode asks for it.
    ///
    /// Runs in parallel over the cell column. Entities without a
    /// [`Transform`] are skipped. Returns how many cells were recomputed.
    pub fn refresh_cells(&mut self, grid: &SpatialGrid) -> usize {
        let Columns {
            transform, cell, ..
        } = &mut self.columns;
        let transform = &*transform;

        cell.data
            .par_iter_mut()
            .enumerate()
            .map(|(slot, assignment)| match (assignment.as_mut(), transform.get(slot)) {
                (Some(assignment), Some(t)) => assignment.refresh(grid, t.position),
                _ => false,
            })
            .filter(|refreshed| *refreshed)
            .count()
    }

    /// Move the column of `T` out of the store.
    ///
    /// While taken, reads of `T` through the store report it missing.
    pub(crate) fn take_column<T: Component>(&mut self) -> Column<T> {
        std::mem::take(T::column_mut(&mut self.columns))
    }

    /// Put a column taken by [`take_column`](Self::take_column) back.
    pub(crate) fn restore_column<T: Component>(&mut self, column: Column<T>) {
        *T::column_mut(&mut self.columns) = column;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use quadrant::{GridConfig, RefreshMode};

    mod lifecycle_tests {
        use super::*;

        #[test]
        fn test_create_assigns_sequential_slots() {
            let mut store = ComponentStore::new();
            let a = store.create_entity();
            let b = store.create_entity();
            assert_eq!((a.index(), b.index()), (0, 1));
            assert_eq!(store.len(), 2);
        }

        #[test]
        fn test_stale_handle_rejected_after_reuse() {
            let mut store = ComponentStore::new();
            let old = store.create_entity();
            store.insert(old, Transform::default()).unwrap();
            store.destroy_entity(old).unwrap();

            let new = store.create_entity();
            assert_eq!(new.index(), old.index());
            assert_eq!(new.generation(), old.generation() + 1);

            let invalid = KernelError::InvalidHandle { entity: old };
            assert_eq!(store.destroy_entity(old).unwrap_err(), invalid);
            assert_eq!(store.get::<Transform>(old).unwrap_err(), invalid);
            assert_eq!(
                store.insert(old, Transform::default()).unwrap_err(),
                invalid
            );
            assert!(!store.has(old, ComponentKind::Transform));
        }

        #[test]
        fn test_reused_slot_starts_empty() {
            let mut store = ComponentStore::new();
            let old = store.create_entity();
            store.insert(old, Targetable::default()).unwrap();
            store.destroy_entity(old).unwrap();

            let new = store.create_entity();
            assert_eq!(store.mask(new).unwrap(), ComponentMask::empty());
            assert!(store.get::<Targetable>(new).is_err());
            assert_eq!(store.count(ComponentKind::Targetable), 0);
        }

        #[test]
        fn test_never_issued_handle_is_invalid() {
            let store = ComponentStore::new();
            assert!(!store.is_alive(Entity::from_raw(4, 0)));
        }
    }

    mod access_tests {
        use super::*;

        #[test]
        fn test_get_missing_component() {
            let mut store = ComponentStore::new();
            let e = store.create_entity();
            assert_eq!(
                store.get::<Swarmer>(e).unwrap_err(),
                KernelError::ComponentMissing {
                    entity: e,
                    kind: ComponentKind::Swarmer
                }
            );
        }

        #[test]
        fn test_set_requires_presence() {
            let mut store = ComponentStore::new();
            let e = store.create_entity();
            assert!(store.set(e, Velocity::default()).is_err());

            store.insert(e, Velocity::default()).unwrap();
            let fast = Velocity {
                direction: Vec3::Z,
                speed: 9.0,
            };
            store.set(e, fast).unwrap();
            assert_eq!(*store.get::<Velocity>(e).unwrap(), fast);
        }

        #[test]
        fn test_insert_returns_previous() {
            let mut store = ComponentStore::new();
            let e = store.create_entity();
            assert_eq!(store.insert(e, PendingDestroy::default()).unwrap(), None);
            let again = store
                .insert(e, PendingDestroy { ticks_elapsed: 2 })
                .unwrap();
            assert_eq!(again, Some(PendingDestroy::default()));
        }

        #[test]
        fn test_remove_updates_mask() {
            let mut store = ComponentStore::new();
            let e = store.create_entity();
            store.insert(e, Fortress::default()).unwrap();
            assert!(store.has(e, ComponentKind::Fortress));

            store.remove::<Fortress>(e).unwrap();
            assert!(!store.has(e, ComponentKind::Fortress));
            assert!(store.remove::<Fortress>(e).is_err());
        }

        #[test]
        fn test_dynamic_access() {
            let mut store = ComponentStore::new();
            let e = store.create_entity();
            let value = ComponentValue::Targetable(Targetable {
                radius: 2.0,
                tag: crate::component::CollisionTag(1),
            });
            store.insert_value(e, value).unwrap();
            assert_eq!(store.read_value(e, ComponentKind::Targetable).unwrap(), value);

            store.remove_kind(e, ComponentKind::Targetable).unwrap();
            assert!(store.read_value(e, ComponentKind::Targetable).is_err());
        }
    }

    mod snapshot_tests {
        use super::*;

        #[test]
        fn test_snapshot_is_slot_ordered_and_skips_dead() {
            let mut store = ComponentStore::new();
            let entities: Vec<_> = (0..4)
                .map(|i| {
                    let e = store.create_entity();
                    #[allow(clippy::cast_precision_loss)]
                    store
                        .insert(e, Transform::at(Vec3::splat(i as f32)))
                        .unwrap();
                    e
                })
                .collect();
            store.destroy_entity(entities[1]).unwrap();

            let snapshot = store.snapshot::<Transform>();
            let order: Vec<_> = snapshot.entities().collect();
            assert_eq!(order, vec![entities[0], entities[2], entities[3]]);
            assert_eq!(
                snapshot.find(entities[2]).map(|t| t.position),
                Some(Vec3::splat(2.0))
            );
            assert!(snapshot.find(entities[1]).is_none());
        }

        #[test]
        fn test_snapshot_is_detached_from_store() {
            let mut store = ComponentStore::new();
            let e = store.create_entity();
            store.insert(e, Transform::default()).unwrap();
            let snapshot = store.snapshot::<Transform>();

            store.set(e, Transform::at(Vec3::X)).unwrap();
            assert_eq!(snapshot.as_slice()[0].1.position, Vec3::ZERO);
        }
    }

    mod refresh_tests {
        use super::*;

        #[test]
        fn test_refresh_cells_respects_modes() {
            let grid = SpatialGrid::new(GridConfig::default()).unwrap();
            let mut store = ComponentStore::new();

            let wall = store.create_entity();
            store.insert(wall, Transform::at(Vec3::new(-45.0, 0.0, 0.0))).unwrap();
            store.insert(wall, CellAssignment::one_shot()).unwrap();

            let shot = store.create_entity();
            store.insert(shot, Transform::at(Vec3::new(45.0, 0.0, 0.0))).unwrap();
            store.insert(shot, CellAssignment::continuous()).unwrap();

            let loose = store.create_entity();
            store.insert(loose, CellAssignment::continuous()).unwrap();

            assert_eq!(store.refresh_cells(&grid), 2);
            let wall_cell = store.get::<CellAssignment>(wall).unwrap().cell;

            store.set(wall, Transform::at(Vec3::new(45.0, 45.0, 90.0))).unwrap();
            store.set(shot, Transform::at(Vec3::new(0.0, 0.0, 50.0))).unwrap();
            assert_eq!(store.refresh_cells(&grid), 1);

            assert_eq!(store.get::<CellAssignment>(wall).unwrap().cell, wall_cell);
            let shot_cell = store.get::<CellAssignment>(shot).unwrap();
            assert_eq!(shot_cell.cell, grid.cell_index(Vec3::new(0.0, 0.0, 50.0)));
            assert_eq!(shot_cell.mode, RefreshMode::ContinuousDone);
            assert!(!store.get::<CellAssignment>(loose).unwrap().is_assigned());
        }

        #[test]
        fn test_taken_column_reads_as_missing() {
            let mut store = ComponentStore::new();
            let e = store.create_entity();
            store.insert(e, Turret::default()).unwrap();

            let column = store.take_column::<Turret>();
            assert!(store.get::<Turret>(e).is_err());
            store.restore_column(column);
            assert!(store.get::<Turret>(e).is_ok());
        }
    }
}
