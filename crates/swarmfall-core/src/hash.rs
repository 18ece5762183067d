//! State hashing for determinism checks.
//!
//! Two simulations fed the same seed, setup and host calls must report the
//! same [`hash_store`] value after every tick. Floats are hashed by their bit
//! patterns, so `-0.0` and `0.0` differ and every NaN payload is distinct.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use glam::{Quat, Vec3};

use crate::component::ComponentValue;
use crate::store::ComponentStore;

/// Hash every live entity and its components, in slot order.
#[must_use]
pub fn hash_store(store: &ComponentStore) -> u64 {
    let mut hasher = DefaultHasher::new();

    store.slot_count().hash(&mut hasher);
    for entity in store.entities() {
        entity.hash(&mut hasher);
        // Live handles always have a mask.
        let Ok(mask) = store.mask(entity) else {
            continue;
        };
        mask.bits().hash(&mut hasher);
        for kind in mask.kinds() {
            if let Ok(value) = store.read_value(entity, kind) {
                hash_value(&value, &mut hasher);
            }
        }
    }

    hasher.finish()
}

fn hash_vec3<H: Hasher>(v: Vec3, hasher: &mut H) {
    v.x.to_bits().hash(hasher);
    v.y.to_bits().hash(hasher);
    v.z.to_bits().hash(hasher);
}

fn hash_quat<H: Hasher>(q: Quat, hasher: &mut H) {
    for c in q.to_array() {
        c.to_bits().hash(hasher);
    }
}

fn hash_value<H: Hasher>(value: &ComponentValue, hasher: &mut H) {
    value.kind().index().hash(hasher);
    match value {
        ComponentValue::Transform(t) => {
            hash_vec3(t.position, hasher);
            hash_quat(t.rotation, hasher);
            t.scale.to_bits().hash(hasher);
        }
        ComponentValue::Velocity(v) => {
            hash_vec3(v.direction, hasher);
            v.speed.to_bits().hash(hasher);
        }
        ComponentValue::CellAssignment(c) => c.hash(hasher),
        ComponentValue::Targetable(t) => {
            t.radius.to_bits().hash(hasher);
            t.tag.hash(hasher);
        }
        ComponentValue::Projectile(p) => {
            p.radius.to_bits().hash(hasher);
            p.tag.hash(hasher);
            p.on_hit.hash(hasher);
            p.randomize_on_hit_rotation.hash(hasher);
            p.min_z.to_bits().hash(hasher);
            p.max_z.to_bits().hash(hasher);
        }
        ComponentValue::Explosion(x) => {
            x.ttl.to_bits().hash(hasher);
            x.shrink_speed.to_bits().hash(hasher);
            x.radius.to_bits().hash(hasher);
            x.tag.hash(hasher);
            x.limit_to_cell.hash(hasher);
            x.dealt_damage.hash(hasher);
        }
        ComponentValue::Turret(t) => {
            t.fire_rate.to_bits().hash(hasher);
            t.cooldown.to_bits().hash(hasher);
            t.min_target_z.to_bits().hash(hasher);
            t.max_target_z.to_bits().hash(hasher);
            hash_quat(t.aim, hasher);
            t.target.hash(hasher);
            t.projectile.hash(hasher);
            t.muzzle_speed.to_bits().hash(hasher);
        }
        ComponentValue::Swarmer(s) => {
            s.speed.to_bits().hash(hasher);
            s.fast_until_z.to_bits().hash(hasher);
            hash_vec3(s.destination, hasher);
        }
        ComponentValue::Fortress(f) => {
            f.shield.to_bits().hash(hasher);
            f.health.to_bits().hash(hasher);
            f.total_hits.hash(hasher);
            f.destroyed.hash(hasher);
        }
        ComponentValue::PendingDestroy(p) => p.ticks_elapsed.hash(hasher),
    }
}
