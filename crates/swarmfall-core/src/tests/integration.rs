//! End-to-end scenarios through the public simulation API.

use glam::Vec3;
use quadrant::RefreshMode;

use super::helpers::{
    battle, init_tracing, register_prefabs, spawn_fortress, spawn_swarmer, swarmer, SWARMER,
    SWARM_TAG,
};
use crate::component::{
    CellAssignment, CollisionTag, ComponentKind, ComponentValue, Fortress, PendingDestroy,
    Projectile, Swarmer, Targetable, Transform, Turret, Velocity,
};
use crate::error::KernelError;
use crate::pass::{FnPass, PassDeclaration};
use crate::prefab::PrefabId;
use crate::proximity::{find_closest, ZRange};
use crate::simulation::Simulation;

// =============================================================================
// Store and Replay
// =============================================================================

#[test]
fn test_unknown_prefab_dropped_tick_continues() {
    init_tracing();
    let mut sim = Simulation::new(1);
    register_prefabs(&mut sim);

    let ghost = sim.spawn(PrefabId::new("ghost"), Vec::new());
    let real = sim.spawn(SWARMER, Vec::new());

    let report = sim.step();
    assert_eq!(report.replay.dropped.len(), 1);
    assert!(matches!(
        report.replay.dropped[0].error,
        KernelError::UnknownPrefab { .. }
    ));
    assert!(report.replay.resolve(ghost).is_none());
    let e = report.replay.resolve(real).unwrap();
    assert!(sim.store().has(e, ComponentKind::Swarmer));
    assert_eq!(sim.tick(), 1);
}

#[test]
fn test_stale_handle_rejected_after_slot_reuse() {
    let mut sim = Simulation::new(1);
    let old = spawn_swarmer(sim.store_mut(), Vec3::ZERO);
    sim.store_mut().destroy_entity(old).unwrap();
    let new = spawn_swarmer(sim.store_mut(), Vec3::ONE);
    assert_eq!(old.index(), new.index());
    assert_ne!(old.generation(), new.generation());

    assert!(matches!(
        sim.read::<Transform>(old),
        Err(KernelError::InvalidHandle { .. })
    ));

    sim.destroy(old);
    let report = sim.step();
    assert!(matches!(
        report.replay.dropped[0].error,
        KernelError::InvalidHandle { .. }
    ));
    assert!(!sim.store().has(new, ComponentKind::PendingDestroy));
}

#[test]
fn test_pending_entity_targets_apply_after_spawn() {
    let mut sim = Simulation::new(1);
    register_prefabs(&mut sim);
    let spawner = FnPass::new(
        PassDeclaration::new("spawner"),
        |_ctx, _view, _f: &mut Fortress, out| {
            let child = out.spawn(SWARMER, Vec::new());
            out.set(
                child,
                Velocity {
                    direction: Vec3::Y,
                    speed: 2.0,
                },
            );
            out.remove(child, ComponentKind::Targetable);
            Ok(())
        },
    );
    sim.register_pass(spawner).unwrap();
    spawn_fortress(sim.store_mut());

    let report = sim.step();
    // `set` needs the component to exist already.
    assert_eq!(report.replay.dropped.len(), 1);
    let child = report.replay.spawned[0].1;
    assert!(!sim.store().has(child, ComponentKind::Targetable));
    assert!(sim.store().has(child, ComponentKind::Swarmer));
}

#[test]
fn test_destroyed_entity_readable_for_one_tick() {
    let mut sim = Simulation::with_default_passes(1).unwrap();
    let e = spawn_swarmer(sim.store_mut(), Vec3::new(0.0, 0.0, -20.0));

    sim.destroy(e);
    sim.step();
    assert!(sim.read::<Transform>(e).is_ok());
    assert!(sim.read::<PendingDestroy>(e).is_ok());

    sim.step();
    assert!(matches!(
        sim.read::<Transform>(e),
        Err(KernelError::InvalidHandle { .. })
    ));
}

// =============================================================================
// Grid
// =============================================================================

#[test]
fn test_continuous_refresh_tracks_movement() {
    let mut sim = Simulation::with_default_passes(1).unwrap();
    let e = sim.store_mut().create_entity();
    sim.store_mut().insert(e, Transform::at(Vec3::ZERO)).unwrap();
    sim.store_mut()
        .insert(e, CellAssignment::continuous())
        .unwrap();
    sim.store_mut()
        .insert(
            e,
            Velocity {
                direction: Vec3::X,
                speed: 300.0,
            },
        )
        .unwrap();

    // Cells are computed at the start of each tick, before motion.
    let mut cells = Vec::new();
    for _ in 0..4 {
        let before = sim.read::<Transform>(e).unwrap().position;
        sim.step();
        let cell = sim.read::<CellAssignment>(e).unwrap().cell;
        assert_eq!(cell, sim.grid().cell_index(before));
        cells.push(cell);
    }
    assert_ne!(cells[0], cells[3]);
}

#[test]
fn test_one_shot_assignment_freezes_until_reset() {
    let mut sim = Simulation::with_default_passes(1).unwrap();
    let e = sim.store_mut().create_entity();
    sim.store_mut().insert(e, Transform::at(Vec3::ZERO)).unwrap();
    sim.store_mut().insert(e, CellAssignment::one_shot()).unwrap();
    sim.store_mut()
        .insert(
            e,
            Velocity {
                direction: Vec3::X,
                speed: 600.0,
            },
        )
        .unwrap();

    sim.step();
    let first = sim.read::<CellAssignment>(e).unwrap();
    assert_eq!(first.mode, RefreshMode::OneShotDone);
    for _ in 0..3 {
        sim.step();
    }
    assert_eq!(sim.read::<CellAssignment>(e).unwrap(), first);

    sim.store_mut()
        .get_mut::<CellAssignment>(e)
        .unwrap()
        .reset();
    sim.step();
    let refreshed = sim.read::<CellAssignment>(e).unwrap();
    assert_eq!(refreshed.mode, RefreshMode::OneShotDone);
    assert_ne!(refreshed.cell, first.cell);
}

// =============================================================================
// Resolver
// =============================================================================

#[test]
fn test_closest_in_z_window_from_store_snapshot() {
    let mut sim = Simulation::new(1);
    let store = sim.store_mut();
    spawn_swarmer(store, Vec3::new(0.0, 0.0, -5.0));
    let wanted = spawn_swarmer(store, Vec3::new(0.0, 0.0, 10.0));
    spawn_swarmer(store, Vec3::new(0.0, 0.0, 50.0));

    let transforms = sim.snapshot::<Transform>();
    let candidates = transforms.iter().map(|(e, t)| (*e, t.position));
    let hit = find_closest(Vec3::ZERO, ZRange::new(0.0, 40.0), candidates).unwrap();
    assert_eq!(hit.entity, wanted);
}

#[test]
fn test_zero_radius_and_zero_tag_shots_never_hit() {
    let mut sim = Simulation::with_default_passes(1).unwrap();
    register_prefabs(&mut sim);
    let store = sim.store_mut();

    let pinpoint = store.create_entity();
    store.insert(pinpoint, Transform::at(Vec3::new(5.0, 5.0, 5.0))).unwrap();
    store.insert(pinpoint, CellAssignment::continuous()).unwrap();
    store
        .insert(pinpoint, Targetable { radius: 0.0, tag: SWARM_TAG })
        .unwrap();
    let zero_shot = store.create_entity();
    store.insert(zero_shot, Transform::at(Vec3::new(5.0, 5.0, 5.0))).unwrap();
    store.insert(zero_shot, CellAssignment::continuous()).unwrap();
    store
        .insert(
            zero_shot,
            Projectile {
                radius: 0.0,
                tag: SWARM_TAG,
                ..Projectile::default()
            },
        )
        .unwrap();

    let untagged = store.create_entity();
    store.insert(untagged, Transform::at(Vec3::new(-5.0, -5.0, 5.0))).unwrap();
    store.insert(untagged, CellAssignment::continuous()).unwrap();
    store
        .insert(untagged, Targetable { radius: 3.0, tag: CollisionTag::NONE })
        .unwrap();
    let untagged_shot = store.create_entity();
    store.insert(untagged_shot, Transform::at(Vec3::new(-5.0, -5.0, 5.0))).unwrap();
    store.insert(untagged_shot, CellAssignment::continuous()).unwrap();
    store
        .insert(
            untagged_shot,
            Projectile {
                radius: 3.0,
                tag: CollisionTag::NONE,
                ..Projectile::default()
            },
        )
        .unwrap();

    sim.step();
    assert_eq!(sim.store().count(ComponentKind::PendingDestroy), 0);
}

// =============================================================================
// Scheduler
// =============================================================================

#[test]
fn test_failing_entities_do_not_block_others_or_later_passes() {
    init_tracing();
    let mut sim = Simulation::new(1);
    sim.register_pass(FnPass::new(
        PassDeclaration::new("picky").reads([ComponentKind::Velocity]),
        |ctx, view, _s: &mut Swarmer, out| {
            view.read::<Velocity>(ctx.entity)?;
            out.tally(1);
            Ok(())
        },
    ))
    .unwrap();
    sim.register_pass(FnPass::new(
        PassDeclaration::new("after"),
        |_ctx, _view, _s: &mut Swarmer, out| {
            out.tally(1);
            Ok(())
        },
    ))
    .unwrap();

    let store = sim.store_mut();
    for i in 0..6u8 {
        let e = spawn_swarmer(store, Vec3::splat(f32::from(i)));
        if i % 3 == 0 {
            store.insert(e, Velocity::default()).unwrap();
        }
    }

    let report = sim.step();
    let picky = report.pass("picky").unwrap();
    assert_eq!(picky.entities, 6);
    assert_eq!(picky.failures.len(), 4);
    assert_eq!(picky.tally, 2);
    assert_eq!(report.pass("after").unwrap().tally, 6);
    assert_eq!(report.failures().count(), 4);
}

#[test]
fn test_in_place_writes_visible_to_later_passes() {
    let mut sim = Simulation::with_default_passes(1).unwrap();
    sim.register_pass(FnPass::new(
        PassDeclaration::new("probe").reads([ComponentKind::Transform]),
        |ctx, view, _v: &mut Velocity, out| {
            let z = view.read::<Transform>(ctx.entity)?.position.z;
            if (z - 1.0).abs() < 1e-5 {
                out.tally(1);
            }
            Ok(())
        },
    ))
    .unwrap();
    let e = sim.store_mut().create_entity();
    sim.store_mut().insert(e, Transform::default()).unwrap();
    sim.store_mut()
        .insert(
            e,
            Velocity {
                direction: Vec3::Z,
                speed: 60.0,
            },
        )
        .unwrap();

    let report = sim.step();
    assert_eq!(report.pass("probe").unwrap().tally, 1);
}

#[test]
fn test_fortress_harvest_applied_same_tick() {
    let mut sim = Simulation::with_default_passes(1).unwrap();
    let fortress = spawn_fortress(sim.store_mut());
    for i in 0..3u8 {
        spawn_swarmer(sim.store_mut(), Vec3::new(f32::from(i), 0.0, 90.0));
    }

    let report = sim.step();
    assert_eq!(report.pass("fortress").unwrap().tally, 3);
    assert_eq!(sim.read::<Fortress>(fortress).unwrap().total_hits, 3);
    assert_eq!(sim.store().count(ComponentKind::PendingDestroy), 3);
}

// =============================================================================
// Full game loop
// =============================================================================

#[test]
fn test_battle_runs_to_completion() {
    init_tracing();
    let mut b = battle(17, 8);
    let total = b.swarmers.len();

    let mut fired = 0;
    for _ in 0..1200 {
        let report = b.sim.step();
        assert_eq!(report.failures().count(), 0);
        fired += report
            .replay
            .spawned
            .iter()
            .filter(|(_, e)| b.sim.store().has(*e, ComponentKind::Projectile))
            .count();
    }

    assert!(fired > 0);
    assert!(b.turrets.iter().all(|t| b.sim.store().has(*t, ComponentKind::Turret)));
    assert_eq!(b.sim.store().count(ComponentKind::Swarmer), 0);
    let fortress = b.sim.read::<Fortress>(b.fortress).unwrap();
    assert!(fortress.total_hits as usize <= total);
    assert!(b.sim.store().len() <= b.sim.resources().game.max_population);
}

#[test]
fn test_turret_fire_rate_follows_frenzy() {
    let run = |frenzy: f32| {
        let mut b = battle(2, 2);
        b.sim.resources_mut().click_rate.frenzy = frenzy;
        let mut shots = 0;
        for _ in 0..120 {
            shots += b
                .sim
                .step()
                .replay
                .spawned
                .iter()
                .filter(|(_, e)| b.sim.store().has(*e, ComponentKind::Projectile))
                .count();
        }
        shots
    };
    assert!(run(1.5) > run(0.0));
}

#[test]
fn test_spawn_components_override_prefab() {
    let mut sim = Simulation::new(1);
    register_prefabs(&mut sim);
    let custom = Swarmer {
        speed: 1.0,
        ..swarmer()
    };
    let pending = sim.spawn(
        SWARMER,
        [
            ComponentValue::from(Transform::at(Vec3::new(1.0, 2.0, 3.0))),
            ComponentValue::from(custom),
            ComponentValue::from(Turret::default()),
        ],
    );
    let report = sim.step();
    let e = report.replay.resolve(pending).unwrap();
    assert_eq!(sim.read::<Swarmer>(e).unwrap(), custom);
    assert_eq!(
        sim.read::<Transform>(e).unwrap().position,
        Vec3::new(1.0, 2.0, 3.0)
    );
    assert!(sim.store().has(e, ComponentKind::Turret));
}
