//! `PassView` gives a pass scoped, read-only access to the store.
//!
//! # Access Control
//!
//! A pass declares the kinds it reads in its
//! [`PassDeclaration`](crate::pass::PassDeclaration). The view enforces this:
//! - In debug builds, reading an undeclared kind panics
//! - In release builds, it behaves as if the component were missing
//!
//! Presence checks (`is_alive`, `has`, `is_dying`) are always allowed, since
//! they expose no component data.
//!
//! # Immutability
//!
//! The view only hands out shared references. The one kind a pass may change
//! in place, its driver, is not reachable through the view at all: it is
//! moved out of the store for the pass's duration.
//!
//! # Example
//!
//! ```
//! use glam::Vec3;
//! use swarmfall_core::component::{ComponentKind, Transform};
//! use swarmfall_core::pass::PassDeclaration;
//! use swarmfall_core::store::ComponentStore;
//! use swarmfall_core::view::PassView;
//!
//! let mut store = ComponentStore::new();
//! let e = store.create_entity();
//! store.insert(e, Transform::at(Vec3::new(0.0, 0.0, 12.0))).unwrap();
//!
//! let decl = PassDeclaration::new("probe").reads([ComponentKind::Transform]);
//! let view = PassView::for_pass(&store, &decl, 0);
//! assert_eq!(view.get::<Transform>(e).map(|t| t.position.z), Some(12.0));
//! ```

use crate::component::{Component, ComponentKind, ComponentMask};
use crate::entity::Entity;
use crate::error::{KernelError, Result};
use crate::pass::PassDeclaration;
use crate::store::{ComponentStore, Snapshot};

/// Scoped, read-only view of the store for one pass.
#[derive(Debug, Clone, Copy)]
pub struct PassView<'a> {
    store: &'a ComponentStore,
    tick: u64,
    pass: &'a str,
    allowed: ComponentMask,
}

impl<'a> PassView<'a> {
    /// A view limited to the kinds `decl` reads.
    #[must_use]
    pub fn for_pass(store: &'a ComponentStore, decl: &'a PassDeclaration, tick: u64) -> Self {
        Self {
            store,
            tick,
            pass: decl.name.as_str(),
            allowed: decl.read_mask(),
        }
    }

    /// A view with access to every kind.
    #[must_use]
    pub fn full_access(store: &'a ComponentStore, tick: u64) -> Self {
        Self {
            store,
            tick,
            pass: "host",
            allowed: ComponentMask::all(),
        }
    }

    /// Tick being simulated.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Whether the handle refers to a live entity.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.store.is_alive(entity)
    }

    /// Whether a live entity carries `kind`.
    #[must_use]
    pub fn has(&self, entity: Entity, kind: ComponentKind) -> bool {
        self.store.has(entity, kind)
    }

    /// Whether the entity is marked for removal at the end of this tick.
    #[must_use]
    pub fn is_dying(&self, entity: Entity) -> bool {
        self.store.has(entity, ComponentKind::PendingDestroy)
    }

    /// Read a component, `None` when absent or the handle is stale.
    ///
    /// # Panics
    ///
    /// In debug builds, if the pass did not declare `T` as a read.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&'a T> {
        self.check_access(T::KIND)?;
        self.store.get::<T>(entity).ok()
    }

    /// Read a component, reporting why it is unavailable.
    ///
    /// # Errors
    ///
    /// - [`KernelError::InvalidHandle`] for a stale handle
    /// - [`KernelError::ComponentMissing`] when absent (or undeclared, in
    ///   release builds)
    ///
    /// # Panics
    ///
    /// In debug builds, if the pass did not declare `T` as a read.
    pub fn read<T: Component>(&self, entity: Entity) -> Result<&'a T> {
        if self.check_access(T::KIND).is_none() {
            return Err(KernelError::ComponentMissing {
                entity,
                kind: T::KIND,
            });
        }
        self.store.get::<T>(entity)
    }

    /// Iterate every `T` in slot order (nothing if undeclared, in release).
    ///
    /// # Panics
    ///
    /// In debug builds, if the pass did not declare `T` as a read.
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (Entity, &'a T)> + 'a {
        let store = self.check_access(T::KIND).map(|()| self.store);
        store.into_iter().flat_map(ComponentStore::iter::<T>)
    }

    /// Slot-ordered snapshot of every `T`.
    ///
    /// # Panics
    ///
    /// In debug builds, if the pass did not declare `T` as a read.
    #[must_use]
    pub fn snapshot<T: Component>(&self) -> Snapshot<T> {
        self.iter::<T>().map(|(entity, value)| (entity, *value)).collect()
    }

    fn check_access(&self, kind: ComponentKind) -> Option<()> {
        if self.allowed.contains(kind.mask()) {
            Some(())
        } else {
            #[cfg(debug_assertions)]
            panic!(
                "PassView access denied: pass '{}' tried to read {} but only declared: {:?}",
                self.pass, kind, self.allowed
            );

            #[cfg(not(debug_assertions))]
            None
        }
    }
}
