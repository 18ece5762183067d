//! Swarmer crashes and fortress damage.
//!
//! Each swarmer inside `fortress_radius` of `fortress_center` is destroyed and
//! adds one to its writer's tally. Once all swarmers ran, the summed tally is
//! applied to the fortress, one hit at a time:
//! - while the shield exceeds `shield_damage_per_hit`, it absorbs the hit
//! - otherwise health loses `health_damage_per_hit`, floored at zero
//!
//! A surviving fortress then regenerates `shield_regen_per_second * dt` of
//! shield, capped at 1. A fortress at zero health is marked destroyed with
//! shield and health both zero.

use crate::component::{ComponentKind, Fortress, Swarmer, Transform};
use crate::config::GameConfig;
use crate::error::Result;
use crate::intent::IntentWriter;
use crate::pass::{Pass, PassContext, PassDeclaration, TickContext};
use crate::view::PassView;

/// Crashes swarmers into the fortress and applies the damage.
#[derive(Debug, Clone)]
pub struct FortressPass {
    declaration: PassDeclaration,
}

impl FortressPass {
    /// Creates a new `FortressPass`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            declaration: PassDeclaration::new("fortress")
                .reads([ComponentKind::Transform, ComponentKind::Fortress]),
        }
    }
}

impl Default for FortressPass {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `hits` crashes and one tick of regeneration.
#[must_use]
pub fn apply_hits(fortress: Fortress, hits: u64, config: &GameConfig) -> Fortress {
    if fortress.destroyed {
        return fortress;
    }

    let mut next = fortress;
    for _ in 0..hits {
        if next.shield > config.shield_damage_per_hit {
            next.shield -= config.shield_damage_per_hit;
        } else {
            next.health = (next.health - config.health_damage_per_hit).max(0.0);
        }
    }
    next.total_hits = next
        .total_hits
        .saturating_add(u32::try_from(hits).unwrap_or(u32::MAX));

    if next.health > 0.0 {
        next.shield = (next.shield + config.shield_regen_per_second * config.dt).min(1.0);
    } else {
        next.shield = 0.0;
        next.health = 0.0;
        next.destroyed = true;
    }
    next
}

impl Pass for FortressPass {
    type Driver = Swarmer;
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
        _swarmer: &mut Swarmer,
        out: &mut IntentWriter,
    ) -> Result<()> {
        if view.is_dying(ctx.entity) {
            return Ok(());
        }
        let config = &ctx.resources.game;
        let position = view.read::<Transform>(ctx.entity)?.position;
        if position.distance(config.fortress_center) < config.fortress_radius {
            out.destroy(ctx.entity);
            out.tally(1);
        }
        Ok(())
    }

    fn complete(
        &self,
        ctx: &TickContext<'_>,
        tally: u64,
        (): &(),
        view: &PassView<'_>,
        out: &mut IntentWriter,
    ) {
        for (entity, fortress) in view.iter::<Fortress>() {
            let next = apply_hits(*fortress, tally, &ctx.resources.game);
            if next != *fortress {
                out.set(entity, next);
            }
        }
    }
}
