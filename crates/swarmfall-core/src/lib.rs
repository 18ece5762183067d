//! # Swarmfall Core
//!
//! Concurrent spatial simulation kernel for the Swarmfall arcade shooter.
//!
//! Tens of thousands of short-lived entities (swarmers, turrets, shots,
//! blasts) are updated every fixed tick by parallel passes over a
//! column-oriented store. Passes never change the population directly: they
//! record intents that are replayed once, in a deterministic order, at the end
//! of the tick.
//!
//! ## Architecture
//!
//! - **Store** ([`store`]): generational entities, one dense column per
//!   component kind
//! - **Grid** ([`quadrant`]): uniform 3D cells that bucket entities for
//!   collision queries
//! - **Buffer** ([`intent`], [`buffer`]): per-writer intent channels and the
//!   end-of-tick replay
//! - **Scheduler** ([`pass`], [`simulation`]): ordered passes, parallel
//!   entity work, scoped read access
//! - **Resolver** ([`proximity`]): closest-target and sphere-overlap queries
//!
//! ## Usage
//!
//! ```
//! use glam::Vec3;
//! use swarmfall_core::component::{Swarmer, Transform};
//! use swarmfall_core::Simulation;
//!
//! let mut sim = Simulation::with_default_passes(7).unwrap();
//! let store = sim.store_mut();
//! let e = store.create_entity();
//! store.insert(e, Transform::default()).unwrap();
//! store
//!     .insert(e, Swarmer { speed: 3.0, fast_until_z: 0.0, destination: Vec3::Z * 10.0 })
//!     .unwrap();
//!
//! for _ in 0..10 {
//!     sim.step();
//! }
//! assert!(sim.read::<Transform>(e).unwrap().position.z > 0.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

// Re-export quadrant for grid setup
pub use quadrant;

pub mod buffer;
pub mod component;
pub mod config;
pub mod entity;
pub mod error;
pub mod hash;
pub mod intent;
pub mod pass;
pub mod passes;
pub mod prefab;
pub mod proximity;
pub mod simulation;
pub mod store;
pub mod view;

pub use component::{Component, ComponentKind, ComponentValue};
pub use config::{ClickRate, GameConfig, Resources};
pub use entity::Entity;
pub use error::{KernelError, Result};
pub use intent::{IntentWriter, PendingEntity};
pub use pass::{FnPass, Pass, PassContext, PassDeclaration};
pub use prefab::{Prefab, PrefabId, PrefabRegistry};
pub use simulation::{Simulation, TickReport};
pub use view::PassView;

#[cfg(test)]
mod tests;
