//! Component kinds and component records.
//!
//! The set of component kinds is closed and known at compile time. Each kind
//! has one fixed-layout `Copy` record type, stored by the
//! [`ComponentStore`](crate::store::ComponentStore) in a dense array indexed
//! by entity slot. Any entity may or may not carry any kind.
//!
//! Two views of the same data exist:
//! - Typed: the [`Component`] trait, used by passes and the store API
//! - Dynamic: [`ComponentValue`] / [`ComponentKind`], used by intents and
//!   prefabs where the kind is only known at runtime

use std::fmt;

use bitflags::bitflags;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

pub use quadrant::CellAssignment;

use crate::entity::Entity;
use crate::prefab::PrefabId;
use crate::store::{Column, Columns};

// =============================================================================
// Component Kind
// =============================================================================

/// Tag identifying one category of per-entity data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ComponentKind {
    /// Position, rotation, scale
    Transform = 0,
    /// Straight-line motion
    Velocity = 1,
    /// Spatial grid cell and refresh mode
    CellAssignment = 2,
    /// Can be hit by projectiles and explosions
    Targetable = 3,
    /// Single-target hit on contact
    Projectile = 4,
    /// Timed area damage
    Explosion = 5,
    /// Aims at and fires on the closest attacker
    Turret = 6,
    /// Attacker flying toward a destination
    Swarmer = 7,
    /// The defended core
    Fortress = 8,
    /// Marked for removal on the next tick
    PendingDestroy = 9,
}

impl ComponentKind {
    /// Number of component kinds.
    pub const COUNT: usize = 10;

    /// All kinds in declaration order.
    pub const ALL: [ComponentKind; Self::COUNT] = [
        Self::Transform,
        Self::Velocity,
        Self::CellAssignment,
        Self::Targetable,
        Self::Projectile,
        Self::Explosion,
        Self::Turret,
        Self::Swarmer,
        Self::Fortress,
        Self::PendingDestroy,
    ];

    /// Position in [`ALL`](Self::ALL).
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The single-bit mask for this kind.
    #[must_use]
    pub const fn mask(self) -> ComponentMask {
        ComponentMask::from_bits_retain(1 << self as u16)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transform => "Transform",
            Self::Velocity => "Velocity",
            Self::CellAssignment => "CellAssignment",
            Self::Targetable => "Targetable",
            Self::Projectile => "Projectile",
            Self::Explosion => "Explosion",
            Self::Turret => "Turret",
            Self::Swarmer => "Swarmer",
            Self::Fortress => "Fortress",
            Self::PendingDestroy => "PendingDestroy",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Set of component kinds present on one slot.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ComponentMask: u16 {
        /// [`ComponentKind::Transform`]
        const TRANSFORM = 1 << 0;
        /// [`ComponentKind::Velocity`]
        const VELOCITY = 1 << 1;
        /// [`ComponentKind::CellAssignment`]
        const CELL_ASSIGNMENT = 1 << 2;
        /// [`ComponentKind::Targetable`]
        const TARGETABLE = 1 << 3;
        /// [`ComponentKind::Projectile`]
        const PROJECTILE = 1 << 4;
        /// [`ComponentKind::Explosion`]
        const EXPLOSION = 1 << 5;
        /// [`ComponentKind::Turret`]
        const TURRET = 1 << 6;
        /// [`ComponentKind::Swarmer`]
        const SWARMER = 1 << 7;
        /// [`ComponentKind::Fortress`]
        const FORTRESS = 1 << 8;
        /// [`ComponentKind::PendingDestroy`]
        const PENDING_DESTROY = 1 << 9;
    }
}

impl ComponentMask {
    /// Iterate the kinds in this mask, in declaration order.
    pub fn kinds(self) -> impl Iterator<Item = ComponentKind> {
        ComponentKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(kind.mask()))
    }
}

impl From<ComponentKind> for ComponentMask {
    fn from(kind: ComponentKind) -> Self {
        kind.mask()
    }
}

// =============================================================================
// Collision Tag
// =============================================================================

/// Integer collision channel.
///
/// Two tags match when they are equal and non-zero. Tag `0` ([`NONE`](Self::NONE))
/// opts an entity out of all collision: it does not even match itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollisionTag(pub u32);

impl CollisionTag {
    /// Never collides with anything.
    pub const NONE: Self = Self(0);

    /// Whether this tag takes part in collision at all.
    #[must_use]
    pub const fn is_collidable(self) -> bool {
        self.0 != 0
    }

    /// Whether an entity tagged `self` collides with one tagged `other`.
    #[must_use]
    pub const fn matches(self, other: Self) -> bool {
        self.0 != 0 && self.0 == other.0
    }
}

// =============================================================================
// Component Records
// =============================================================================

/// Position, orientation and uniform scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// World position
    pub position: Vec3,
    /// Orientation
    pub rotation: Quat,
    /// Uniform scale
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 1.0,
        }
    }
}

impl Transform {
    /// Identity transform at a position.
    #[must_use]
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Local forward axis (+Z) in world space.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }
}

/// Straight-line motion along a fixed direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    /// Unit direction of travel
    pub direction: Vec3,
    /// Units per second
    pub speed: f32,
}

/// Makes an entity a hit candidate for projectiles and explosions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Targetable {
    /// Collision sphere radius
    pub radius: f32,
    /// Collision channel
    pub tag: CollisionTag,
}

/// A shot that removes itself and the first thing it touches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Hit sphere radius
    pub radius: f32,
    /// Channel of targets this shot can hit
    pub tag: CollisionTag,
    /// Spawned at the point of impact
    pub on_hit: Option<PrefabId>,
    /// Give the impact spawn a random yaw
    pub randomize_on_hit_rotation: bool,
    /// Removed once its z drops below this
    pub min_z: f32,
    /// Removed once its z rises above this
    pub max_z: f32,
}

impl Default for Projectile {
    fn default() -> Self {
        Self {
            radius: 0.5,
            tag: CollisionTag::NONE,
            on_hit: None,
            randomize_on_hit_rotation: false,
            min_z: -30.0,
            max_z: 100.0,
        }
    }
}

/// Timed blast that damages everything it overlaps, once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Explosion {
    /// Seconds left to live
    pub ttl: f32,
    /// Scale lost per second
    pub shrink_speed: f32,
    /// Blast radius
    pub radius: f32,
    /// Channel of targets this blast can destroy
    pub tag: CollisionTag,
    /// Only hit targets in the blast's own grid cell
    pub limit_to_cell: bool,
    /// Damage has already been dealt
    pub dealt_damage: bool,
}

impl Default for Explosion {
    fn default() -> Self {
        Self {
            ttl: 1.0,
            shrink_speed: 1.0,
            radius: 0.0,
            tag: CollisionTag::NONE,
            limit_to_cell: true,
            dealt_damage: false,
        }
    }
}

impl Explosion {
    /// Whether this blast can ever destroy anything.
    #[must_use]
    pub const fn is_explosive(&self) -> bool {
        self.tag.is_collidable() && self.radius > 0.0
    }
}

/// A static gun that tracks the closest attacker inside a z window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Turret {
    /// Seconds between shots before frenzy bonus
    pub fire_rate: f32,
    /// Seconds until the next shot
    pub cooldown: f32,
    /// Ignore targets nearer than this z
    pub min_target_z: f32,
    /// Ignore targets beyond this z
    pub max_target_z: f32,
    /// Current aim
    pub aim: Quat,
    /// Weak handle to the current target
    pub target: Option<Entity>,
    /// Shot prefab
    pub projectile: Option<PrefabId>,
    /// Speed given to spawned shots
    pub muzzle_speed: f32,
}

impl Default for Turret {
    fn default() -> Self {
        Self {
            fire_rate: 0.5,
            cooldown: 0.0,
            min_target_z: -9999.0,
            max_target_z: 9999.0,
            aim: Quat::IDENTITY,
            target: None,
            projectile: None,
            muzzle_speed: 60.0,
        }
    }
}

/// An attacker flying at a fixed destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Swarmer {
    /// Cruise speed
    pub speed: f32,
    /// Moves at 8x speed while its z is below this
    pub fast_until_z: f32,
    /// Where it is heading
    pub destination: Vec3,
}

/// The structure the turrets defend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fortress {
    /// Shield strength in `[0, 1]`
    pub shield: f32,
    /// Health in `[0, 1]`
    pub health: f32,
    /// Crashes taken since the fortress was placed, never reset
    pub total_hits: u32,
    /// Health reached zero
    pub destroyed: bool,
}

impl Default for Fortress {
    fn default() -> Self {
        Self {
            shield: 1.0,
            health: 1.0,
            total_hits: 0,
            destroyed: false,
        }
    }
}

/// Two-phase destroy marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDestroy {
    /// Ticks observed with the marker
    pub ticks_elapsed: u32,
}

// =============================================================================
// Component Value
// =============================================================================

/// Any component record, tagged by kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ComponentValue {
    /// [`Transform`] record
    Transform(Transform),
    /// [`Velocity`] record
    Velocity(Velocity),
    /// [`CellAssignment`] record
    CellAssignment(CellAssignment),
    /// [`Targetable`] record
    Targetable(Targetable),
    /// [`Projectile`] record
    Projectile(Projectile),
    /// [`Explosion`] record
    Explosion(Explosion),
    /// [`Turret`] record
    Turret(Turret),
    /// [`Swarmer`] record
    Swarmer(Swarmer),
    /// [`Fortress`] record
    Fortress(Fortress),
    /// [`PendingDestroy`] record
    PendingDestroy(PendingDestroy),
}

impl ComponentValue {
    /// Kind of the wrapped record.
    #[must_use]
    pub const fn kind(&self) -> ComponentKind {
        match self {
            Self::Transform(_) => ComponentKind::Transform,
            Self::Velocity(_) => ComponentKind::Velocity,
            Self::CellAssignment(_) => ComponentKind::CellAssignment,
            Self::Targetable(_) => ComponentKind::Targetable,
            Self::Projectile(_) => ComponentKind::Projectile,
            Self::Explosion(_) => ComponentKind::Explosion,
            Self::Turret(_) => ComponentKind::Turret,
            Self::Swarmer(_) => ComponentKind::Swarmer,
            Self::Fortress(_) => ComponentKind::Fortress,
            Self::PendingDestroy(_) => ComponentKind::PendingDestroy,
        }
    }
}

// =============================================================================
// Component Trait
// =============================================================================

/// Typed access to one component kind.
///
/// Implemented for every record type above and nothing else; the set of
/// kinds is closed.
pub trait Component: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// The kind this record type stores.
    const KIND: ComponentKind;

    /// Wrap into a dynamic value.
    fn into_value(self) -> ComponentValue;

    /// Unwrap from a dynamic value of the same kind.
    fn from_value(value: &ComponentValue) -> Option<Self>;

    #[doc(hidden)]
    fn column(columns: &Columns) -> &Column<Self>;

    #[doc(hidden)]
    fn column_mut(columns: &mut Columns) -> &mut Column<Self>;
}

macro_rules! impl_component {
    ($ty:ident, $field:ident) => {
        impl Component for $ty {
            const KIND: ComponentKind = ComponentKind::$ty;

            fn into_value(self) -> ComponentValue {
                ComponentValue::$ty(self)
            }

            fn from_value(value: &ComponentValue) -> Option<Self> {
                match value {
                    ComponentValue::$ty(inner) => Some(*inner),
                    _ => None,
                }
            }

            fn column(columns: &Columns) -> &Column<Self> {
                &columns.$field
            }

            fn column_mut(columns: &mut Columns) -> &mut Column<Self> {
                &mut columns.$field
            }
        }

        impl From<$ty> for ComponentValue {
            fn from(value: $ty) -> Self {
                ComponentValue::$ty(value)
            }
        }
    };
}

impl_component!(Transform, transform);
impl_component!(Velocity, velocity);
impl_component!(CellAssignment, cell);
impl_component!(Targetable, targetable);
impl_component!(Projectile, projectile);
impl_component!(Explosion, explosion);
impl_component!(Turret, turret);
impl_component!(Swarmer, swarmer);
impl_component!(Fortress, fortress);
impl_component!(PendingDestroy, pending_destroy);

#[cfg(test)]
mod tests {
    use super::*;

    mod kind_tests {
        use super::*;

        #[test]
        fn test_all_is_in_discriminant_order() {
            for (i, kind) in ComponentKind::ALL.iter().enumerate() {
                assert_eq!(kind.index(), i);
            }
        }

        #[test]
        fn test_masks_are_distinct_bits() {
            let mut seen = ComponentMask::empty();
            for kind in ComponentKind::ALL {
                assert!(!seen.intersects(kind.mask()), "{kind} overlaps");
                seen |= kind.mask();
            }
            assert_eq!(seen, ComponentMask::all());
        }

        #[test]
        fn test_mask_kinds_round_trip() {
            let mask = ComponentMask::TRANSFORM | ComponentMask::TURRET;
            let kinds: Vec<_> = mask.kinds().collect();
            assert_eq!(kinds, vec![ComponentKind::Transform, ComponentKind::Turret]);
        }
    }

    mod tag_tests {
        use super::*;

        #[test]
        fn test_none_never_matches() {
            assert!(!CollisionTag::NONE.matches(CollisionTag::NONE));
            assert!(!CollisionTag::NONE.matches(CollisionTag(3)));
            assert!(!CollisionTag(3).matches(CollisionTag::NONE));
        }

        #[test]
        fn test_equal_nonzero_matches() {
            assert!(CollisionTag(2).matches(CollisionTag(2)));
            assert!(!CollisionTag(2).matches(CollisionTag(1)));
        }
    }

    mod value_tests {
        use super::*;

        #[test]
        fn test_value_kind_matches_component_kind() {
            let value: ComponentValue = Turret::default().into();
            assert_eq!(value.kind(), Turret::KIND);
            assert_eq!(Turret::from_value(&value), Some(Turret::default()));
            assert_eq!(Swarmer::from_value(&value), None);
        }

        #[test]
        fn test_values_are_serializable() {
            let value = ComponentValue::Projectile(Projectile {
                on_hit: Some(PrefabId::new("spark")),
                ..Default::default()
            });
            let json = serde_json::to_string(&value).unwrap();
            let parsed: ComponentValue = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, value);
        }

        #[test]
        fn test_transform_forward() {
            let t = Transform::at(Vec3::ONE);
            assert_eq!(t.forward(), Vec3::Z);
            assert_eq!(t.scale, 1.0);
        }
    }
}
