//! Turret targeting and firing.
//!
//! Every tick a turret:
//! 1. stays idle (and drops its target) while the fortress is destroyed
//! 2. picks the closest swarmer whose z is inside its target window
//! 3. turns its aim toward that target
//! 4. counts its cooldown down, and on reaching zero fires along its aim and
//!    resets the cooldown to [`GameConfig::fire_interval`]
//!
//! Firing spawns the turret's projectile prefab at the turret with a
//! [`Transform`] facing the aim and a [`Velocity`] of `muzzle_speed`.
//!
//! [`GameConfig::fire_interval`]: crate::config::GameConfig::fire_interval

use glam::{Quat, Vec3};

use crate::component::{
    ComponentKind, ComponentValue, Fortress, Swarmer, Transform, Turret, Velocity,
};
use crate::entity::Entity;
use crate::error::Result;
use crate::intent::IntentWriter;
use crate::pass::{Pass, PassContext, PassDeclaration, TickContext};
use crate::proximity::{find_closest, ZRange};
use crate::view::PassView;

/// Data shared by every turret for one tick.
#[derive(Debug, Clone, Default)]
pub struct TurretTargets {
    /// Whether any fortress has been destroyed
    pub fortress_down: bool,
    /// Live, non-dying swarmers and their positions, in slot order
    pub swarmers: Vec<(Entity, Vec3)>,
}

/// Aims and fires turrets.
#[derive(Debug, Clone)]
pub struct TurretPass {
    declaration: PassDeclaration,
}

impl TurretPass {
    /// Creates a new `TurretPass`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            declaration: PassDeclaration::new("turret")
                .reads([
                    ComponentKind::Transform,
                    ComponentKind::Swarmer,
                    ComponentKind::Fortress,
                ])
                .writes([ComponentKind::Turret]),
        }
    }
}

impl Default for TurretPass {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for TurretPass {
    type Driver = Turret;
    type Shared = TurretTargets;

    fn declaration(&self) -> &PassDeclaration {
        &self.declaration
    }

    fn prepare(&self, _ctx: &TickContext<'_>, view: &PassView<'_>) -> TurretTargets {
        let fortress_down = view.iter::<Fortress>().any(|(_, f)| f.destroyed);
        let swarmers = view
            .iter::<Swarmer>()
            .filter(|(entity, _)| !view.is_dying(*entity))
            .filter_map(|(entity, _)| Some((entity, view.get::<Transform>(entity)?.position)))
            .collect();
        TurretTargets {
            fortress_down,
            swarmers,
        }
    }

    fn run(
        &self,
        ctx: &PassContext<'_>,
        targets: &TurretTargets,
        view: &PassView<'_>,
        turret: &mut Turret,
        out: &mut IntentWriter,
    ) -> Result<()> {
        if targets.fortress_down {
            turret.target = None;
            return Ok(());
        }

        let position = view.read::<Transform>(ctx.entity)?.position;
        let window = ZRange::new(turret.min_target_z, turret.max_target_z);
        let closest = find_closest(position, window, targets.swarmers.iter().copied());
        turret.target = closest.map(|c| c.entity);

        if let Some(closest) = closest {
            let direction = (targets.swarmers[closest.index].1 - position).normalize_or_zero();
            if direction != Vec3::ZERO {
                turret.aim = Quat::from_rotation_arc(Vec3::Z, direction);
            }
        }

        turret.cooldown -= ctx.dt();
        if turret.cooldown <= 0.0 {
            let config = &ctx.resources.game;
            turret.cooldown = config.fire_interval(turret.fire_rate, ctx.resources.click_rate.frenzy);

            if let Some(prefab) = turret.projectile {
                let transform = Transform {
                    position,
                    rotation: turret.aim,
                    scale: 1.0,
                };
                let velocity = Velocity {
                    direction: transform.forward(),
                    speed: turret.muzzle_speed,
                };
                out.spawn(
                    prefab,
                    [ComponentValue::from(transform), ComponentValue::from(velocity)],
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::test_support::sim_with;
    use crate::prefab::{Prefab, PrefabId};
    use crate::simulation::Simulation;

    const BOLT: PrefabId = PrefabId::new("bolt");

    fn setup() -> (Simulation, Entity) {
        let mut sim = sim_with(TurretPass::new());
        sim.prefabs_mut()
            .register(Prefab::new("bolt").with(Transform::default()));
        let store = sim.store_mut();
        let turret = store.create_entity();
        store.insert(turret, Transform::default()).unwrap();
        store
            .insert(
                turret,
                Turret {
                    min_target_z: 0.0,
                    max_target_z: 40.0,
                    projectile: Some(BOLT),
                    ..Turret::default()
                },
            )
            .unwrap();
        (sim, turret)
    }

    fn add_swarmer(sim: &mut Simulation, at: Vec3) -> Entity {
        let store = sim.store_mut();
        let e = store.create_entity();
        store.insert(e, Transform::at(at)).unwrap();
        store.insert(e, Swarmer::default()).unwrap();
        e
    }

    #[test]
    fn test_targets_closest_inside_window() {
        let (mut sim, turret) = setup();
        add_swarmer(&mut sim, Vec3::new(0.0, 0.0, -5.0));
        let wanted = add_swarmer(&mut sim, Vec3::new(0.0, 0.0, 10.0));
        add_swarmer(&mut sim, Vec3::new(0.0, 0.0, 50.0));

        sim.step();
        let state = sim.read::<Turret>(turret).unwrap();
        assert_eq!(state.target, Some(wanted));
        assert!(state.aim.mul_vec3(Vec3::Z).abs_diff_eq(Vec3::Z, 1e-5));
    }

    #[test]
    fn test_fires_along_aim_then_waits() {
        let (mut sim, turret) = setup();
        add_swarmer(&mut sim, Vec3::new(10.0, 0.0, 0.0));

        let first = sim.step();
        assert_eq!(first.replay.spawned.len(), 1);
        let bolt = first.replay.spawned[0].1;
        let velocity = sim.read::<Velocity>(bolt).unwrap();
        assert!(velocity.direction.abs_diff_eq(Vec3::X, 1e-5));
        assert!((velocity.speed - 60.0).abs() < 1e-6);
        assert!((sim.read::<Turret>(turret).unwrap().cooldown - 0.5).abs() < 1e-6);

        let second = sim.step();
        assert!(second.replay.spawned.is_empty());
    }

    #[test]
    fn test_frenzy_shortens_cooldown() {
        let (mut sim, turret) = setup();
        sim.resources_mut().click_rate.frenzy = 1.0;
        sim.step();
        assert!((sim.read::<Turret>(turret).unwrap().cooldown - 0.26).abs() < 1e-6);
    }

    #[test]
    fn test_idle_while_fortress_down() {
        let (mut sim, turret) = setup();
        add_swarmer(&mut sim, Vec3::new(0.0, 0.0, 10.0));
        let store = sim.store_mut();
        let fortress = store.create_entity();
        store
            .insert(
                fortress,
                Fortress {
                    destroyed: true,
                    ..Fortress::default()
                },
            )
            .unwrap();

        let report = sim.step();
        assert!(report.replay.spawned.is_empty());
        assert_eq!(sim.read::<Turret>(turret).unwrap().target, None);
    }
}
