//! First-hit collision for shots.
//!
//! Each tick a shot:
//! 1. is destroyed if its z left `[min_z, max_z]`
//! 2. otherwise looks for the first targetable in its own cell whose tag
//!    matches and whose sphere overlaps its own
//! 3. on a hit, destroys itself and the target and spawns its `on_hit` prefab
//!    part way between the two (`GameConfig::impact_lerp`)
//!
//! A shot whose cell is not assigned yet hits nothing. A shot with no
//! [`CellAssignment`] at all is a setup error and fails its update.

use std::f32::consts::PI;

use glam::{EulerRot, Quat};
use rand::Rng;

use crate::component::{CellAssignment, ComponentKind, ComponentValue, Projectile, Transform};
use crate::error::Result;
use crate::intent::IntentWriter;
use crate::pass::{Pass, PassContext, PassDeclaration, TickContext};
use crate::proximity::{radius_overlap, CandidateSet, HitPolicy};
use crate::view::PassView;

/// Collides shots with targetables.
#[derive(Debug, Clone)]
pub struct ProjectilePass {
    declaration: PassDeclaration,
}

impl ProjectilePass {
    /// Creates a new `ProjectilePass`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            declaration: PassDeclaration::new("projectile").reads([
                ComponentKind::Transform,
                ComponentKind::CellAssignment,
                ComponentKind::Targetable,
            ]),
        }
    }
}

impl Default for ProjectilePass {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for ProjectilePass {
    type Driver = Projectile;
    type Shared = CandidateSet;

    fn declaration(&self) -> &PassDeclaration {
        &self.declaration
    }

    fn prepare(&self, _ctx: &TickContext<'_>, view: &PassView<'_>) -> CandidateSet {
        CandidateSet::from_view(view)
    }

    fn run(
        &self,
        ctx: &PassContext<'_>,
        candidates: &CandidateSet,
        view: &PassView<'_>,
        projectile: &mut Projectile,
        out: &mut IntentWriter,
    ) -> Result<()> {
        if view.is_dying(ctx.entity) {
            return Ok(());
        }

        let position = view.read::<Transform>(ctx.entity)?.position;
        if position.z < projectile.min_z || position.z > projectile.max_z {
            out.destroy(ctx.entity);
            return Ok(());
        }

        let Some(cell) = view.read::<CellAssignment>(ctx.entity)?.assigned_cell() else {
            return Ok(());
        };

        let hits = radius_overlap(
            position,
            projectile.radius,
            candidates.in_cell(cell).filter(|c| c.entity != ctx.entity),
            projectile.tag,
            HitPolicy::First,
        );
        let Some(hit) = hits.first() else {
            return Ok(());
        };

        out.destroy(ctx.entity);
        out.destroy(hit.entity);

        if let Some(prefab) = projectile.on_hit {
            let rotation = if projectile.randomize_on_hit_rotation {
                let mut rng = ctx.rng();
                Quat::from_euler(
                    EulerRot::XYZ,
                    rng.gen_range(-PI..PI),
                    rng.gen_range(-PI..PI),
                    rng.gen_range(-PI..PI),
                )
            } else {
                Quat::IDENTITY
            };
            let impact = Transform {
                position: position.lerp(hit.position, ctx.resources.game.impact_lerp),
                rotation,
                scale: 1.0,
            };
            out.spawn(prefab, [ComponentValue::from(impact)]);
        }

        Ok(())
    }
}
