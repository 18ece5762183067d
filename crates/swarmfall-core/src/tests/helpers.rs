//! Test helper functions for setting up simulations and entities.

use glam::Vec3;

use crate::component::{
    CellAssignment, CollisionTag, Explosion, Fortress, Projectile, Swarmer, Targetable, Transform,
    Turret, Velocity,
};
use crate::entity::Entity;
use crate::prefab::{Prefab, PrefabId};
use crate::simulation::Simulation;
use crate::store::ComponentStore;

/// Channel shared by swarmers, shots and blasts.
pub const SWARM_TAG: CollisionTag = CollisionTag(1);

/// Shot fired by turrets.
pub const BOLT: PrefabId = PrefabId::new("bolt");
/// Blast left where a shot hits.
pub const SPARK: PrefabId = PrefabId::new("spark");
/// Attacker.
pub const SWARMER: PrefabId = PrefabId::new("swarmer");

/// Route kernel logs to the test harness; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Prefabs
// =============================================================================

/// Register `bolt`, `spark` and `swarmer`.
pub fn register_prefabs(sim: &mut Simulation) {
    let prefabs = sim.prefabs_mut();
    prefabs.register(
        Prefab::new("bolt")
            .with(Transform::default())
            .with(Velocity::default())
            .with(CellAssignment::continuous())
            .with(Projectile {
                radius: 0.5,
                tag: SWARM_TAG,
                on_hit: Some(SPARK),
                randomize_on_hit_rotation: true,
                ..Projectile::default()
            }),
    );
    prefabs.register(
        Prefab::new("spark")
            .with(Transform::default())
            .with(CellAssignment::one_shot())
            .with(Explosion {
                ttl: 0.3,
                shrink_speed: 4.0,
                radius: 2.0,
                tag: SWARM_TAG,
                limit_to_cell: false,
                dealt_damage: false,
            }),
    );
    prefabs.register(
        Prefab::new("swarmer")
            .with(Transform::default())
            .with(CellAssignment::continuous())
            .with(Targetable {
                radius: 1.0,
                tag: SWARM_TAG,
            })
            .with(swarmer()),
    );
}

/// Attacker stats used across tests.
pub fn swarmer() -> Swarmer {
    Swarmer {
        speed: 6.0,
        fast_until_z: 0.0,
        destination: Vec3::new(0.0, 0.0, 94.0),
    }
}

// =============================================================================
// Entity Factories
// =============================================================================

/// Place an attacker directly in the store.
pub fn spawn_swarmer(store: &mut ComponentStore, position: Vec3) -> Entity {
    let e = store.create_entity();
    store.insert(e, Transform::at(position)).unwrap();
    store.insert(e, CellAssignment::continuous()).unwrap();
    store
        .insert(
            e,
            Targetable {
                radius: 1.0,
                tag: SWARM_TAG,
            },
        )
        .unwrap();
    store.insert(e, swarmer()).unwrap();
    e
}

/// Place a turret that fires `bolt`s at attackers below z = 70.
pub fn spawn_turret(store: &mut ComponentStore, position: Vec3) -> Entity {
    let e = store.create_entity();
    store.insert(e, Transform::at(position)).unwrap();
    store
        .insert(
            e,
            Turret {
                min_target_z: -30.0,
                max_target_z: 70.0,
                projectile: Some(BOLT),
                ..Turret::default()
            },
        )
        .unwrap();
    e
}

/// Place the fortress.
pub fn spawn_fortress(store: &mut ComponentStore) -> Entity {
    let e = store.create_entity();
    store
        .insert(e, Transform::at(Vec3::new(0.0, 0.0, 94.0)))
        .unwrap();
    store.insert(e, Fortress::default()).unwrap();
    e
}

// =============================================================================
// Scenarios
// =============================================================================

/// Handles of a battle set up by [`battle`].
pub struct Battle {
    /// The simulation
    pub sim: Simulation,
    /// The fortress
    pub fortress: Entity,
    /// The turrets
    pub turrets: Vec<Entity>,
    /// The attackers, in spawn order
    pub swarmers: Vec<Entity>,
}

/// A fortress, four turrets and `side * side` attackers on a square at z = -20.
pub fn battle(seed: u64, side: u32) -> Battle {
    let mut sim = Simulation::with_default_passes(seed).unwrap();
    register_prefabs(&mut sim);

    let store = sim.store_mut();
    let fortress = spawn_fortress(store);
    let turrets = [(-20.0, -20.0), (20.0, -20.0), (-20.0, 20.0), (20.0, 20.0)]
        .into_iter()
        .map(|(x, y)| spawn_turret(store, Vec3::new(x, y, 80.0)))
        .collect();

    let mut swarmers = Vec::new();
    #[allow(clippy::cast_precision_loss)]
    let spacing = 60.0 / side.max(1) as f32;
    for i in 0..side {
        for j in 0..side {
            #[allow(clippy::cast_precision_loss)]
            let position = Vec3::new(
                -30.0 + spacing * (i as f32 + 0.5),
                -30.0 + spacing * (j as f32 + 0.5),
                -20.0,
            );
            swarmers.push(spawn_swarmer(store, position));
        }
    }

    Battle {
        sim,
        fortress,
        turrets,
        swarmers,
    }
}
