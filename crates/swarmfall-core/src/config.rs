//! Process-wide singletons.
//!
//! Game tuning and per-frame input summaries are owned by the
//! [`Simulation`](crate::simulation::Simulation) as [`Resources`], set up
//! before the first tick and handed to every pass read-only through its
//! [`PassContext`](crate::pass::PassContext). Hosts may change them between
//! ticks, never during one.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Fixed timestep (60 Hz).
pub const FIXED_DT: f32 = 1.0 / 60.0;

/// Game tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Seconds advanced per tick
    pub dt: f32,
    /// Spawns beyond this population are dropped
    pub max_population: usize,
    /// Entities farther than this from the origin have left the arena
    pub escape_distance: f32,
    /// Swarmer speed multiplier below their `fast_until_z`
    pub fast_approach_multiplier: f32,
    /// Impact spawns appear this far from the shot toward the target
    pub impact_lerp: f32,
    /// Seconds shaved off a turret's fire rate per unit of frenzy
    pub frenzy_fire_rate_bonus: f32,
    /// Turrets never fire faster than this
    pub min_fire_interval: f32,
    /// Fortress position
    pub fortress_center: Vec3,
    /// Swarmers within this distance of the fortress crash into it
    pub fortress_radius: f32,
    /// Shield lost per crash
    pub shield_damage_per_hit: f32,
    /// Health lost per crash once the shield is down
    pub health_damage_per_hit: f32,
    /// Shield regained per second
    pub shield_regen_per_second: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            dt: FIXED_DT,
            max_population: 22_000,
            escape_distance: 250.0,
            fast_approach_multiplier: 8.0,
            impact_lerp: 0.6,
            frenzy_fire_rate_bonus: 0.24,
            min_fire_interval: 0.05,
            fortress_center: Vec3::new(0.0, 0.0, 94.0),
            fortress_radius: 34.0,
            shield_damage_per_hit: 0.0003,
            health_damage_per_hit: 0.0007,
            shield_regen_per_second: 0.009,
        }
    }
}

impl GameConfig {
    /// Seconds between turret shots for a base fire rate under `frenzy`.
    #[must_use]
    pub fn fire_interval(&self, fire_rate: f32, frenzy: f32) -> f32 {
        (fire_rate - frenzy * self.frenzy_fire_rate_bonus).max(self.min_fire_interval)
    }
}

/// How hard the player is clicking, sampled by the input layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClickRate {
    /// Frenzy level, 0 when idle
    pub frenzy: f32,
}

/// All singletons injected into passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    /// Game tuning
    pub game: GameConfig,
    /// Player input summary
    pub click_rate: ClickRate,
}
