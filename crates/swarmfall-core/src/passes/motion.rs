//! Motion for everything with a [`Transform`].
//!
//! Per entity, in this order:
//! - [`Velocity`]: `position += direction * speed * dt`
//! - [`Swarmer`]: step toward the destination, never overshooting, at
//!   `fast_approach_multiplier` times speed while below `fast_until_z`
//! - [`Explosion`]: scale eases toward zero at `shrink_speed`, or grows
//!   toward [`EXPAND_LIMIT`] when `shrink_speed` is negative
//!
//! Anything that ends up farther than `escape_distance` from the origin is
//! destroyed.
//!
//! Transforms are written in place, so every later pass of the same tick sees
//! the new positions.

use crate::component::{ComponentKind, Explosion, Swarmer, Transform, Velocity};
use crate::config::GameConfig;
use crate::error::Result;
use crate::intent::IntentWriter;
use crate::pass::{Pass, PassContext, PassDeclaration, TickContext};
use crate::view::PassView;

/// Scale a negative-shrink explosion grows toward.
pub const EXPAND_LIMIT: f32 = 1000.0;

/// Moves, steers and scales transforms.
#[derive(Debug, Clone)]
pub struct MotionPass {
    declaration: PassDeclaration,
}

impl MotionPass {
    /// Creates a new `MotionPass`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            declaration: PassDeclaration::new("motion")
                .reads([
                    ComponentKind::Velocity,
                    ComponentKind::Swarmer,
                    ComponentKind::Explosion,
                ])
                .writes([ComponentKind::Transform]),
        }
    }
}

impl Default for MotionPass {
    fn default() -> Self {
        Self::new()
    }
}

fn steer(transform: &mut Transform, swarmer: &Swarmer, config: &GameConfig, dt: f32) {
    let to_destination = swarmer.destination - transform.position;
    let distance = to_destination.length();
    let multiplier = if transform.position.z < swarmer.fast_until_z {
        config.fast_approach_multiplier
    } else {
        1.0
    };
    let step = swarmer.speed * multiplier * dt;

    if distance <= step {
        transform.position = swarmer.destination;
    } else {
        transform.position += to_destination / distance * step;
    }
}

fn ease_scale(transform: &mut Transform, explosion: &Explosion, dt: f32) {
    let (target, speed) = if explosion.shrink_speed < 0.0 {
        (EXPAND_LIMIT, -explosion.shrink_speed)
    } else {
        (0.0, explosion.shrink_speed)
    };
    let t = speed * dt;
    transform.scale += (target - transform.scale) * t;
}

impl Pass for MotionPass {
    type Driver = Transform;
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
        transform: &mut Transform,
        out: &mut IntentWriter,
    ) -> Result<()> {
        let dt = ctx.dt();
        let config = &ctx.resources.game;

        if let Some(velocity) = view.get::<Velocity>(ctx.entity) {
            transform.position += velocity.direction * velocity.speed * dt;
        }

        if let Some(swarmer) = view.get::<Swarmer>(ctx.entity) {
            steer(transform, swarmer, config, dt);
        }

        if let Some(explosion) = view.get::<Explosion>(ctx.entity) {
            ease_scale(transform, explosion, dt);
        }

        if transform.position.length() > config.escape_distance && !view.is_dying(ctx.entity) {
            out.destroy(ctx.entity);
        }

        Ok(())
    }
}
