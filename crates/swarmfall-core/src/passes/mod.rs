//! Gameplay passes.
//!
//! - [`DestructionPass`]: built in, removes entities a tick after they are marked
//! - [`MotionPass`]: integrates velocities, steers swarmers, shrinks blasts
//! - [`ProjectilePass`]: first-hit collision for shots
//! - [`ExplosionPass`]: one-off area damage and blast lifetime
//! - [`TurretPass`]: target selection and firing
//! - [`FortressPass`]: swarmer crashes and fortress damage
//!
//! # Registration
//!
//! [`Simulation::with_default_passes`](crate::simulation::Simulation::with_default_passes)
//! schedules them in the order listed above.

mod destruction;
mod explosion;
mod fortress;
mod motion;
mod projectile;
mod turret;

pub use destruction::DestructionPass;
pub use explosion::ExplosionPass;
pub use fortress::FortressPass;
pub use motion::MotionPass;
pub use projectile::ProjectilePass;
pub use turret::TurretPass;
