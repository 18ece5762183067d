//! Cross-module tests for the kernel.
//!
//! - `determinism.rs`: identical seeds and setup give identical state hashes,
//!   regardless of thread count or writer submission order
//! - `integration.rs`: end-to-end scenarios through [`Simulation`](crate::simulation::Simulation)
//! - `helpers.rs`: prefabs, entity factories and scenario setup

mod helpers;
mod integration;

pub use helpers::*;
