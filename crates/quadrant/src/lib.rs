//! # Quadrant
//!
//! Uniform 3D cell grid for coarse spatial bucketing.
//!
//! Quadrant divides a fixed, axis-aligned world box into `SX × SY × SZ`
//! equally sized cells and maps any position to a flat cell id in O(1).
//! Entities that share a cell are candidates for proximity tests; entities in
//! different cells are never compared unless a query explicitly widens its
//! scope. This keeps all-pairs collision checks bounded by cell occupancy
//! rather than by total population.
//!
//! - **Grid**: [`GridConfig`] and [`SpatialGrid`] (position → cell mapping)
//! - **Assignment**: [`CellAssignment`] and the [`RefreshMode`] state machine
//!   that decides whether an entity's cell is recomputed every tick or frozen
//!   after the first computation
//!
//! ## Quick Start
//!
//! ```
//! use glam::Vec3;
//! use quadrant::{CellAssignment, GridConfig, SpatialGrid};
//!
//! let grid = SpatialGrid::new(GridConfig::default()).unwrap();
//!
//! let mut wall = CellAssignment::one_shot();
//! assert!(wall.refresh(&grid, Vec3::new(10.0, 0.0, 5.0)));
//! assert!(wall.is_assigned());
//!
//! // Frozen: moving the wall does not change its cell.
//! let before = wall.cell;
//! assert!(!wall.refresh(&grid, Vec3::new(-40.0, 40.0, 90.0)));
//! assert_eq!(wall.cell, before);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assignment;
pub mod grid;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-exports for convenience
pub use assignment::{CellAssignment, RefreshMode};
pub use grid::{CellIndex, GridConfig, SpatialGrid};

/// Errors raised when building a grid from an invalid configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    /// One or more axes has a split count of zero.
    #[error("grid split counts must be at least 1 on every axis (got {x}x{y}x{z})")]
    ZeroSplits {
        /// Splits along X
        x: u32,
        /// Splits along Y
        y: u32,
        /// Splits along Z
        z: u32,
    },

    /// The bounding box has zero or negative extent on some axis.
    #[error("grid bounds must have positive extent (min {min}, max {max})")]
    DegenerateBounds {
        /// Minimum corner
        min: Vec3,
        /// Maximum corner
        max: Vec3,
    },

    /// The total cell count does not fit in a `u32` cell id.
    #[error("grid has too many cells ({cells}) for a 32-bit cell id")]
    TooManyCells {
        /// Requested cell count
        cells: u64,
    },
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Bounds {
    /// Create bounds from dimensions (centered at origin).
    #[must_use]
    pub fn new(width: f32, height: f32, depth: f32) -> Self {
        Self {
            min: Vec3::new(-width / 2.0, -height / 2.0, -depth / 2.0),
            max: Vec3::new(width / 2.0, height / 2.0, depth / 2.0),
        }
    }

    /// Create bounds from min/max corners.
    #[must_use]
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Get the center of the bounds.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the size of the bounds.
    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Clamp a point into the bounds, axis by axis.
    #[must_use]
    pub fn clamp(&self, point: Vec3) -> Vec3 {
        point.max(self.min).min(self.max)
    }

    /// Check if a point is inside the bounds (inclusive on both ends).
    #[must_use]
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Check if this bounds intersects a sphere.
    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let closest = self.clamp(center);
        center.distance_squared(closest) <= radius * radius
    }
}

impl Default for Bounds {
    /// The playfield: 100 wide, 100 tall, 130 deep,
    /// shifted forward so the far plane sits at z = 100.
    fn default() -> Self {
        Self::from_min_max(Vec3::new(-50.0, -50.0, -30.0), Vec3::new(50.0, 50.0, 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_contains() {
        let bounds = Bounds::new(10.0, 10.0, 10.0);
        assert!(bounds.contains(Vec3::ZERO));
        assert!(bounds.contains(Vec3::new(5.0, 5.0, 5.0)));
        assert!(!bounds.contains(Vec3::new(10.0, 0.0, 0.0)));
    }

    #[test]
    fn test_bounds_clamp() {
        let bounds = Bounds::default();
        assert_eq!(
            bounds.clamp(Vec3::new(-500.0, 0.0, 500.0)),
            Vec3::new(-50.0, 0.0, 100.0)
        );
        assert_eq!(bounds.clamp(Vec3::new(1.0, 2.0, 3.0)), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_bounds_sphere() {
        let bounds = Bounds::new(10.0, 10.0, 10.0);
        assert!(bounds.intersects_sphere(Vec3::new(7.0, 0.0, 0.0), 2.5));
        assert!(!bounds.intersects_sphere(Vec3::new(8.0, 0.0, 0.0), 2.5));
    }

    #[test]
    fn test_default_bounds_size() {
        assert_eq!(Bounds::default().size(), Vec3::new(100.0, 100.0, 130.0));
    }
}
