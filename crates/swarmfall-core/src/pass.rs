//! Update passes: per-entity behavior run in parallel over one driver kind.
//!
//! A pass names a *driver* component kind. The scheduler runs the pass once
//! for every live entity that carries the driver, in parallel, handing each
//! invocation:
//! - a mutable reference to that entity's driver record
//! - a [`PassView`] scoped to the kinds the pass declared as reads
//! - a private [`IntentWriter`] for structural changes
//!
//! # Declarations
//!
//! Each pass declares a [`PassDeclaration`]:
//! - `name`: unique within a simulation
//! - `reads`: kinds the pass may read through its view
//! - `exclusive_writes`: kinds the pass mutates in place (at most its driver)
//!
//! A pass that does not list its driver under `exclusive_writes` receives it
//! read-only in spirit: in debug builds, changing it is an invariant
//! violation. Two passes may never both exclusively write the same kind.
//!
//! # Lifecycle per tick
//!
//! 1. [`Pass::prepare`] once, to build read-only data shared by all workers
//! 2. [`Pass::run`] once per driver entity, in parallel
//! 3. [`Pass::complete`] once, with the sum of every writer's tally
//!
//! When `run` returns an error, that entity's driver record is rolled back,
//! its writer is discarded and the failure is recorded in the [`PassReport`].
//! Other entities are unaffected.
//!
//! # Example
//!
//! ```
//! use swarmfall_core::component::{ComponentKind, Velocity};
//! use swarmfall_core::pass::{FnPass, PassDeclaration};
//! use swarmfall_core::simulation::Simulation;
//!
//! let decay = FnPass::new(
//!     PassDeclaration::new("decay").writes([ComponentKind::Velocity]),
//!     |ctx, _view, velocity: &mut Velocity, _out| {
//!         velocity.speed *= 1.0 - ctx.dt();
//!         Ok(())
//!     },
//! );
//!
//! let mut sim = Simulation::new(7);
//! sim.register_pass(decay).unwrap();
//! ```

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use quadrant::SpatialGrid;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buffer::DeferredBuffer;
use crate::component::{Component, ComponentKind, ComponentMask};
use crate::config::Resources;
use crate::entity::Entity;
use crate::error::{KernelError, Result};
use crate::intent::IntentWriter;
use crate::store::ComponentStore;
use crate::view::PassView;

/// Writer id of the channel handed to [`Pass::complete`].
pub const COMPLETION_WRITER: u32 = u32::MAX;

// =============================================================================
// Pass Declaration
// =============================================================================

/// What a pass reads and what it mutates in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassDeclaration {
    /// Unique name
    pub name: String,
    /// Kinds readable through the pass's view
    pub reads: Vec<ComponentKind>,
    /// Kinds mutated in place
    pub exclusive_writes: Vec<ComponentKind>,
}

impl PassDeclaration {
    /// A declaration with no reads and no writes.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reads: Vec::new(),
            exclusive_writes: Vec::new(),
        }
    }

    /// Add read kinds.
    #[must_use]
    pub fn reads(mut self, kinds: impl IntoIterator<Item = ComponentKind>) -> Self {
        self.reads.extend(kinds);
        self
    }

    /// Add exclusive write kinds.
    #[must_use]
    pub fn writes(mut self, kinds: impl IntoIterator<Item = ComponentKind>) -> Self {
        self.exclusive_writes.extend(kinds);
        self
    }

    /// Mask of declared reads.
    #[must_use]
    pub fn read_mask(&self) -> ComponentMask {
        self.reads.iter().map(|k| k.mask()).collect()
    }

    /// Whether `kind` is declared as an exclusive write.
    #[must_use]
    pub fn writes_kind(&self, kind: ComponentKind) -> bool {
        self.exclusive_writes.contains(&kind)
    }
}

// =============================================================================
// Contexts
// =============================================================================

/// Tick-wide context handed to [`Pass::prepare`] and [`Pass::complete`].
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    /// Tick being simulated
    pub tick: u64,
    /// Position of the pass in the schedule, starting at 1
    pub pass_order: u32,
    /// Simulation seed
    pub master_seed: u64,
    /// Process-wide singletons
    pub resources: &'a Resources,
    /// Spatial index the store's cells refer to
    pub grid: &'a SpatialGrid,
}

impl<'a> TickContext<'a> {
    /// Seconds advanced this tick.
    #[must_use]
    pub fn dt(&self) -> f32 {
        self.resources.game.dt
    }

    /// Per-entity context, with a seed derived from (seed, tick, pass, entity).
    #[must_use]
    pub fn for_entity(&self, entity: Entity) -> PassContext<'a> {
        let mut hasher = DefaultHasher::new();
        self.master_seed.hash(&mut hasher);
        self.tick.hash(&mut hasher);
        self.pass_order.hash(&mut hasher);
        entity.to_bits().hash(&mut hasher);

        PassContext {
            entity,
            tick: self.tick,
            pass_order: self.pass_order,
            seed: hasher.finish(),
            resources: self.resources,
            grid: self.grid,
        }
    }
}

/// Context for one [`Pass::run`] invocation.
#[derive(Debug, Clone, Copy)]
pub struct PassContext<'a> {
    /// Entity the driver record belongs to
    pub entity: Entity,
    /// Tick being simulated
    pub tick: u64,
    /// Position of the pass in the schedule, starting at 1
    pub pass_order: u32,
    /// Deterministic per-invocation seed
    pub seed: u64,
    /// Process-wide singletons
    pub resources: &'a Resources,
    /// Spatial index the store's cells refer to
    pub grid: &'a SpatialGrid,
}

impl PassContext<'_> {
    /// Seconds advanced this tick.
    #[must_use]
    pub fn dt(&self) -> f32 {
        self.resources.game.dt
    }

    /// Random stream private to this invocation.
    #[must_use]
    pub fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed)
    }
}

// =============================================================================
// Pass Trait
// =============================================================================

/// A unit of per-entity behavior.
///
/// # Thread Safety
///
/// `run` is called concurrently from many worker threads, so passes must be
/// `Send + Sync` and keep no interior mutable state.
pub trait Pass: Send + Sync {
    /// Kind whose holders this pass runs over.
    type Driver: Component;

    /// Read-only data built once per tick and shared by all workers.
    type Shared: Sync;

    /// Returns this pass's declaration.
    fn declaration(&self) -> &PassDeclaration;

    /// Build the shared data for this tick.
    fn prepare(&self, ctx: &TickContext<'_>, view: &PassView<'_>) -> Self::Shared;

    /// Update one entity.
    ///
    /// # Errors
    ///
    /// Any error rolls `driver` back, discards `out` for this entity and is
    /// recorded in the tick's [`PassReport`].
    fn run(
        &self,
        ctx: &PassContext<'_>,
        shared: &Self::Shared,
        view: &PassView<'_>,
        driver: &mut Self::Driver,
        out: &mut IntentWriter,
    ) -> Result<()>;

    /// Called once after every entity ran, with the summed writer tallies.
    ///
    /// Intents recorded here join the same end-of-tick replay.
    fn complete(
        &self,
        _ctx: &TickContext<'_>,
        _tally: u64,
        _shared: &Self::Shared,
        _view: &PassView<'_>,
        _out: &mut IntentWriter,
    ) {
    }
}

// =============================================================================
// Closure Pass
// =============================================================================

/// A [`Pass`] built from a closure, with no shared data.
pub struct FnPass<T, F> {
    declaration: PassDeclaration,
    body: F,
    _driver: PhantomData<fn() -> T>,
}

impl<T, F> FnPass<T, F>
where
    T: Component,
    F: Fn(&PassContext<'_>, &PassView<'_>, &mut T, &mut IntentWriter) -> Result<()> + Send + Sync,
{
    /// Wrap `body` as a pass driven by `T`.
    #[must_use]
    pub fn new(declaration: PassDeclaration, body: F) -> Self {
        Self {
            declaration,
            body,
            _driver: PhantomData,
        }
    }
}

impl<T, F> fmt::Debug for FnPass<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPass")
            .field("declaration", &self.declaration)
            .finish_non_exhaustive()
    }
}

impl<T, F> Pass for FnPass<T, F>
where
    T: Component,
    F: Fn(&PassContext<'_>, &PassView<'_>, &mut T, &mut IntentWriter) -> Result<()> + Send + Sync,
{
    type Driver = T;
    type Shared = ();

    fn declaration(&self) -> &PassDeclaration {
        &self.declaration
    }

    fn prepare(&self, _ctx: &TickContext<'_>, _view: &PassView<'_>) {}

    fn run(
        &self,
        ctx: &PassContext<'_>,
        (): &(),
        view: &PassView<'_>,
        driver: &mut T,
        out: &mut IntentWriter,
    ) -> Result<()> {
        (self.body)(ctx, view, driver, out)
    }
}

// =============================================================================
// Reports
// =============================================================================

/// One entity whose update failed.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityFailure {
    /// Entity whose run failed
    pub entity: Entity,
    /// Why
    pub error: KernelError,
}

/// What one pass did during one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    /// Pass name
    pub name: String,
    /// Driver entities visited
    pub entities: usize,
    /// Intents submitted to the buffer
    pub intents: usize,
    /// Sum of the surviving writers' tallies
    pub tally: u64,
    /// Entities whose run failed, in slot order
    pub failures: Vec<EntityFailure>,
}

// =============================================================================
// Type-erased Execution
// =============================================================================

/// Object-safe form of [`Pass`] used by the scheduler.
pub(crate) trait ErasedPass: Send + Sync {
    fn declaration(&self) -> &PassDeclaration;

    fn driver_kind(&self) -> ComponentKind;

    fn execute(
        &self,
        store: &mut ComponentStore,
        ctx: &TickContext<'_>,
        buffer: &mut DeferredBuffer,
    ) -> PassReport;
}

impl<P: Pass> ErasedPass for P {
    fn declaration(&self) -> &PassDeclaration {
        Pass::declaration(self)
    }

    fn driver_kind(&self) -> ComponentKind {
        P::Driver::KIND
    }

    fn execute(
        &self,
        store: &mut ComponentStore,
        ctx: &TickContext<'_>,
        buffer: &mut DeferredBuffer,
    ) -> PassReport {
        let decl = Pass::declaration(self);
        let _span = tracing::debug_span!("pass", name = %decl.name, order = ctx.pass_order).entered();
        let writes_driver = decl.writes_kind(P::Driver::KIND);

        let mut column = store.take_column::<P::Driver>();
        let mut report = PassReport {
            name: decl.name.clone(),
            ..PassReport::default()
        };

        {
            let store: &ComponentStore = store;
            let view = PassView::for_pass(store, decl, ctx.tick);
            let shared = self.prepare(ctx, &view);

            let outcomes: Vec<(Entity, Result<()>, IntentWriter)> = column
                .slots_mut()
                .par_iter_mut()
                .enumerate()
                .filter_map(|(slot, driver)| {
                    let driver = driver.as_mut()?;
                    let entity = store.entity_at(slot)?;
                    let entity_ctx = ctx.for_entity(entity);
                    let mut out = IntentWriter::new(ctx.pass_order, entity.index());

                    let before = *driver;
                    let result = self.run(&entity_ctx, &shared, &view, driver, &mut out);
                    if result.is_err() {
                        *driver = before;
                    }
                    if cfg!(debug_assertions) && !writes_driver && *driver != before {
                        panic!(
                            "invariant violation: pass '{}' mutated {} on {} without declaring it as an exclusive write",
                            decl.name,
                            P::Driver::KIND,
                            entity
                        );
                    }
                    Some((entity, result, out))
                })
                .collect();

            let mut tally = 0;
            for (entity, result, out) in outcomes {
                report.entities += 1;
                match result {
                    Ok(()) => {
                        tally += out.tally_total();
                        report.intents += out.len();
                        buffer.submit(out);
                    }
                    Err(error) => {
                        debug!(pass = %decl.name, %entity, %error, "entity update failed, intents discarded");
                        report.failures.push(EntityFailure { entity, error });
                    }
                }
            }

            let mut out = IntentWriter::new(ctx.pass_order, COMPLETION_WRITER);
            self.complete(ctx, tally, &shared, &view, &mut out);
            report.tally = tally;
            report.intents += out.len();
            buffer.submit(out);
        }

        store.restore_column(column);
        report
    }
}

/// Check a new pass against the ones already scheduled.
///
/// Name clashes are always rejected. Access conflicts are checked in debug
/// builds only.
pub(crate) fn validate_registration(
    scheduled: &[Box<dyn ErasedPass>],
    decl: &PassDeclaration,
    driver: ComponentKind,
) -> Result<()> {
    if scheduled.iter().any(|p| p.declaration().name == decl.name) {
        return Err(KernelError::DuplicatePass {
            name: decl.name.clone(),
        });
    }

    if !cfg!(debug_assertions) {
        return Ok(());
    }

    if let Some(kind) = decl.exclusive_writes.iter().find(|k| **k != driver) {
        return Err(KernelError::invariant(format!(
            "pass '{}' declares {kind} as an exclusive write but only drives {driver}",
            decl.name
        )));
    }

    if decl.reads.contains(&driver) {
        return Err(KernelError::invariant(format!(
            "pass '{}' declares its driver {driver} as a read",
            decl.name
        )));
    }

    for kind in &decl.exclusive_writes {
        if let Some(other) = scheduled
            .iter()
            .find(|p| p.declaration().writes_kind(*kind))
        {
            return Err(KernelError::invariant(format!(
                "passes '{}' and '{}' both exclusively write {kind}",
                other.declaration().name,
                decl.name
            )));
        }
    }

    Ok(())
}
