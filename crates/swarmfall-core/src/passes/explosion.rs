//! Blast lifetime and one-off area damage.
//!
//! A blast counts its `ttl` down every tick. The first tick its cell is
//! assigned, an explosive blast (collidable tag, positive radius) destroys
//! every overlapping targetable with a matching tag. With `limit_to_cell` only
//! the blast's own cell is searched, otherwise every cell the blast sphere
//! touches.
//!
//! A blast is removed once its `ttl` has run out and it either can not deal
//! damage this tick (no assigned cell, or not explosive) or already has. The
//! writer tally counts targets destroyed.

use crate::component::{CellAssignment, ComponentKind, Explosion, Transform};
use crate::error::Result;
use crate::intent::IntentWriter;
use crate::pass::{Pass, PassContext, PassDeclaration, TickContext};
use crate::proximity::{radius_overlap, CandidateSet, HitPolicy};
use crate::view::PassView;

/// Ages blasts and applies their damage.
#[derive(Debug, Clone)]
pub struct ExplosionPass {
    declaration: PassDeclaration,
}

impl ExplosionPass {
    /// Creates a new `ExplosionPass`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            declaration: PassDeclaration::new("explosion")
                .reads([
                    ComponentKind::Transform,
                    ComponentKind::CellAssignment,
                    ComponentKind::Targetable,
                ])
                .writes([ComponentKind::Explosion]),
        }
    }
}

impl Default for ExplosionPass {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for ExplosionPass {
    type Driver = Explosion;
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
        explosion: &mut Explosion,
        out: &mut IntentWriter,
    ) -> Result<()> {
        explosion.ttl -= ctx.dt();

        let cell = view
            .get::<CellAssignment>(ctx.entity)
            .and_then(CellAssignment::assigned_cell);

        let explodable = cell.is_some() && explosion.is_explosive();

        if let Some(cell) = cell {
            if explodable && !explosion.dealt_damage {
                let center = view.read::<Transform>(ctx.entity)?.position;
                explosion.dealt_damage = true;

                let scope = if explosion.limit_to_cell {
                    candidates.in_cell(cell).collect::<Vec<_>>()
                } else {
                    candidates.in_cells(&ctx.grid.cells_in_radius(center, explosion.radius))
                };
                let hits = radius_overlap(
                    center,
                    explosion.radius,
                    scope.into_iter().filter(|c| c.entity != ctx.entity),
                    explosion.tag,
                    HitPolicy::All,
                );
                for hit in &hits {
                    out.destroy(hit.entity);
                }
                out.tally(hits.len() as u64);
            }
        }

        let spent = !explodable || explosion.dealt_damage;
        if explosion.ttl <= 0.0 && spent && !view.is_dying(ctx.entity) {
            out.destroy(ctx.entity);
        }

        Ok(())
    }
}
