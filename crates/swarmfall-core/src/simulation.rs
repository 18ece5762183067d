//! The tick loop.
//!
//! `Simulation` owns the store, the spatial grid, the prefab registry, the
//! resources and the pass schedule, and advances them one fixed step at a
//! time:
//!
//! 1. **REFRESH**: recompute grid cells for entities whose mode asks for it
//! 2. **PASSES**: run every pass in registration order, entity work in
//!    parallel, each entity recording into its own writer
//! 3. **REPLAY**: merge all writers (host calls included) and apply them once
//! 4. **ADVANCE**: bump the tick counter
//!
//! # Determinism
//!
//! Given the same seed, setup and host calls, two simulations reach the same
//! [`state_hash`](Simulation::state_hash) after every tick:
//! - writers are merged by (pass, writer id) and replayed by
//!   (pass order, sequence) with a stable sort
//! - writer ids are slot indices, which replay assigns deterministically
//! - per-entity random streams are seeded from (seed, tick, pass, entity)
//!
//! # Example
//!
//! ```
//! use glam::Vec3;
//! use swarmfall_core::component::{ComponentValue, Transform, Velocity};
//! use swarmfall_core::prefab::Prefab;
//! use swarmfall_core::simulation::Simulation;
//!
//! let mut sim = Simulation::with_default_passes(42).unwrap();
//! let drifter = Prefab::new("drifter")
//!     .with(Transform::default())
//!     .with(Velocity { direction: Vec3::Z, speed: 6.0 });
//! let id = drifter.id();
//! sim.prefabs_mut().register(drifter);
//!
//! let pending = sim.spawn(id, [ComponentValue::from(Transform::at(Vec3::new(0.0, 0.0, 1.0)))]);
//! let report = sim.step();
//! let entity = report.replay.resolve(pending).unwrap();
//!
//! for _ in 0..60 {
//!     sim.step();
//! }
//! let z = sim.read::<Transform>(entity).unwrap().position.z;
//! assert!((z - 7.0).abs() < 1e-3);
//! ```

use std::fmt;

use quadrant::SpatialGrid;
use tracing::debug;

use crate::buffer::{replay_capped, DeferredBuffer, ReplayReport};
use crate::component::{Component, ComponentKind, ComponentValue};
use crate::config::Resources;
use crate::entity::Entity;
use crate::error::Result;
use crate::hash::hash_store;
use crate::intent::{IntentWriter, PendingEntity};
use crate::pass::{validate_registration, EntityFailure, ErasedPass, Pass, PassReport, TickContext};
use crate::passes::{
    DestructionPass, ExplosionPass, FortressPass, MotionPass, ProjectilePass, TurretPass,
};
use crate::prefab::{PrefabId, PrefabRegistry};
use crate::store::{ComponentStore, Snapshot};

/// Writer id of the host channel.
const HOST_WRITER: u32 = 0;

/// What one call to [`Simulation::step`] did.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Tick that was simulated
    pub tick: u64,
    /// Cells recomputed by the grid refresh
    pub refreshed_cells: usize,
    /// One report per pass, in schedule order
    pub passes: Vec<PassReport>,
    /// Outcome of the end-of-tick replay
    pub replay: ReplayReport,
}

impl TickReport {
    /// Report of the pass called `name`.
    #[must_use]
    pub fn pass(&self, name: &str) -> Option<&PassReport> {
        self.passes.iter().find(|p| p.name == name)
    }

    /// Every per-entity failure across all passes, in schedule order.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &EntityFailure)> {
        self.passes
            .iter()
            .flat_map(|p| p.failures.iter().map(move |f| (p.name.as_str(), f)))
    }
}

// =============================================================================
// Simulation
// =============================================================================

/// Owner of all simulation state and the pass schedule.
pub struct Simulation {
    store: ComponentStore,
    grid: SpatialGrid,
    prefabs: PrefabRegistry,
    resources: Resources,
    passes: Vec<Box<dyn ErasedPass>>,
    host: IntentWriter,
    tick: u64,
    master_seed: u64,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.tick)
            .field("master_seed", &self.master_seed)
            .field("entities", &self.store.len())
            .field("passes", &self.pass_names())
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// A simulation with the default grid and resources and only the
    /// built-in destruction pass scheduled.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, SpatialGrid::default(), Resources::default())
    }

    /// A simulation over a custom grid and resources.
    #[must_use]
    pub fn with_config(seed: u64, grid: SpatialGrid, resources: Resources) -> Self {
        Self {
            store: ComponentStore::new(),
            grid,
            prefabs: PrefabRegistry::new(),
            resources,
            passes: vec![Box::new(DestructionPass::new())],
            host: IntentWriter::new(0, HOST_WRITER),
            tick: 0,
            master_seed: seed,
        }
    }

    /// A simulation with every gameplay pass scheduled.
    ///
    /// # Errors
    ///
    /// Never fails with the built-in passes; the `Result` surfaces
    /// registration checks.
    pub fn with_default_passes(seed: u64) -> Result<Self> {
        let mut sim = Self::new(seed);
        sim.register_default_passes()?;
        Ok(sim)
    }

    /// Schedule the gameplay passes after whatever is already registered.
    ///
    /// # Errors
    ///
    /// See [`register_pass`](Self::register_pass).
    pub fn register_default_passes(&mut self) -> Result<()> {
        self.register_pass(MotionPass::new())?;
        self.register_pass(ProjectilePass::new())?;
        self.register_pass(ExplosionPass::new())?;
        self.register_pass(TurretPass::new())?;
        self.register_pass(FortressPass::new())
    }

    /// Append a pass to the schedule.
    ///
    /// # Errors
    ///
    /// - [`KernelError::DuplicatePass`](crate::error::KernelError::DuplicatePass)
    ///   if the name is taken
    /// - [`KernelError::InvariantViolation`](crate::error::KernelError::InvariantViolation)
    ///   in debug builds, on conflicting exclusive writes or a pass that
    ///   reads or writes kinds it cannot
    pub fn register_pass<P: Pass + 'static>(&mut self, pass: P) -> Result<()> {
        validate_registration(&self.passes, Pass::declaration(&pass), P::Driver::KIND)?;
        debug!(pass = %Pass::declaration(&pass).name, order = self.passes.len() + 1, "pass registered");
        self.passes.push(Box::new(pass));
        Ok(())
    }

    /// Scheduled pass names, in order.
    #[must_use]
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes
            .iter()
            .map(|p| p.declaration().name.as_str())
            .collect()
    }

    // ===== Tick =====

    /// Run one tick.
    pub fn step(&mut self) -> TickReport {
        let _span = tracing::debug_span!("tick", tick = self.tick).entered();

        let refreshed_cells = self.store.refresh_cells(&self.grid);

        let mut buffer = DeferredBuffer::new();
        buffer.submit(std::mem::replace(
            &mut self.host,
            IntentWriter::new(0, HOST_WRITER),
        ));

        let mut passes = Vec::with_capacity(self.passes.len());
        for (i, pass) in self.passes.iter().enumerate() {
            // Schedules hold a handful of passes.
            #[allow(clippy::cast_possible_truncation)]
            let ctx = TickContext {
                tick: self.tick,
                pass_order: i as u32 + 1,
                master_seed: self.master_seed,
                resources: &self.resources,
                grid: &self.grid,
            };
            passes.push(pass.execute(&mut self.store, &ctx, &mut buffer));
        }

        let intents = buffer.drain_ordered();
        let replay = replay_capped(
            &mut self.store,
            &self.prefabs,
            intents,
            self.resources.game.max_population,
        );
        debug!(
            applied = replay.applied,
            dropped = replay.dropped.len(),
            population = self.store.len(),
            "tick replayed"
        );

        let report = TickReport {
            tick: self.tick,
            refreshed_cells,
            passes,
            replay,
        };
        self.tick += 1;
        report
    }

    // ===== Host boundary =====

    /// Request an entity from `prefab`; it exists after the next replay.
    pub fn spawn(
        &mut self,
        prefab: PrefabId,
        components: impl IntoIterator<Item = ComponentValue>,
    ) -> PendingEntity {
        self.host.spawn(prefab, components)
    }

    /// Two-phase destroy, applied through the next ticks' replays.
    pub fn destroy(&mut self, entity: Entity) {
        self.host.destroy(entity);
    }

    /// Host intents waiting for the next replay.
    #[must_use]
    pub fn pending_intents(&self) -> usize {
        self.host.len()
    }

    /// Copy of one component.
    ///
    /// # Errors
    ///
    /// `InvalidHandle` for stale handles, `ComponentMissing` when absent.
    pub fn read<T: Component>(&self, entity: Entity) -> Result<T> {
        self.store.get::<T>(entity).copied()
    }

    /// One component, by kind.
    ///
    /// # Errors
    ///
    /// Same as [`read`](Self::read).
    pub fn read_value(&self, entity: Entity, kind: ComponentKind) -> Result<ComponentValue> {
        self.store.read_value(entity, kind)
    }

    /// Slot-ordered snapshot of every `T`.
    #[must_use]
    pub fn snapshot<T: Component>(&self) -> Snapshot<T> {
        self.store.snapshot::<T>()
    }

    /// Deterministic hash of the store.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        hash_store(&self.store)
    }

    // ===== Accessors =====

    /// The store.
    #[must_use]
    pub fn store(&self) -> &ComponentStore {
        &self.store
    }

    /// Direct store access for setup between ticks.
    pub fn store_mut(&mut self) -> &mut ComponentStore {
        &mut self.store
    }

    /// The spatial grid.
    #[must_use]
    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    /// Registered prefabs.
    #[must_use]
    pub fn prefabs(&self) -> &PrefabRegistry {
        &self.prefabs
    }

    /// Registered prefabs, for registration.
    pub fn prefabs_mut(&mut self) -> &mut PrefabRegistry {
        &mut self.prefabs
    }

    /// Singletons.
    #[must_use]
    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// Singletons, for changes between ticks.
    pub fn resources_mut(&mut self) -> &mut Resources {
        &mut self.resources
    }

    /// Next tick to be simulated.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Master seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.master_seed
    }
}
