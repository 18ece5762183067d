//! Grid: position to cell mapping.
//!
//! The grid covers a fixed [`Bounds`] and splits each axis into a configured
//! number of equal slices. Positions outside the bounds are clamped onto the
//! boundary first, so every position maps to some cell.

use std::fmt;

use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::{Bounds, GridError};

/// Flat identifier of one grid cell.
///
/// Flattened as `x + y * SX + z * SX * SY`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CellIndex(u32);

impl CellIndex {
    /// Create a cell index from its raw value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Get the raw value as a `usize`, for indexing.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

/// Configuration for a [`SpatialGrid`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// World bounds covered by the grid
    pub bounds: Bounds,
    /// Number of cells along each axis
    pub splits: UVec3,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            bounds: Bounds::default(),
            splits: UVec3::splat(20),
        }
    }
}

impl GridConfig {
    /// Create a config with the default bounds and the given split counts.
    #[must_use]
    pub fn with_splits(x: u32, y: u32, z: u32) -> Self {
        Self {
            splits: UVec3::new(x, y, z),
            ..Default::default()
        }
    }
}

/// A validated uniform grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialGrid {
    config: GridConfig,
    /// Cached `bounds.size()`
    size: Vec3,
}

impl SpatialGrid {
    /// Build a grid from a config.
    ///
    /// # Errors
    ///
    /// - [`GridError::ZeroSplits`] if any axis has zero splits
    /// - [`GridError::DegenerateBounds`] if any axis has non-positive extent
    /// - [`GridError::TooManyCells`] if the cell count overflows a `u32`
    pub fn new(config: GridConfig) -> Result<Self, GridError> {
        let splits = config.splits;
        if splits.min_element() == 0 {
            return Err(GridError::ZeroSplits {
                x: splits.x,
                y: splits.y,
                z: splits.z,
            });
        }

        let size = config.bounds.size();
        if !size.is_finite() || size.cmple(Vec3::ZERO).any() {
            return Err(GridError::DegenerateBounds {
                min: config.bounds.min,
                max: config.bounds.max,
            });
        }

        let cells = u64::from(splits.x) * u64::from(splits.y) * u64::from(splits.z);
        if cells > u64::from(u32::MAX) {
            return Err(GridError::TooManyCells { cells });
        }

        Ok(Self { config, size })
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Get the covered bounds.
    #[must_use]
    pub fn bounds(&self) -> &Bounds {
        &self.config.bounds
    }

    /// Get the per-axis split counts.
    #[must_use]
    pub fn splits(&self) -> UVec3 {
        self.config.splits
    }

    /// Total number of cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        let s = self.config.splits;
        s.x as usize * s.y as usize * s.z as usize
    }

    /// Size of a single cell.
    #[must_use]
    pub fn cell_size(&self) -> Vec3 {
        self.size / self.config.splits.as_vec3()
    }

    /// Per-axis cell coordinates of a position.
    ///
    /// The position is clamped into the bounds, normalized, scaled by the
    /// split counts and floored. The upper boundary (`p == max`) falls into
    /// the last cell rather than one past it.
    #[must_use]
    pub fn cell_coords(&self, position: Vec3) -> UVec3 {
        let local = self.config.bounds.clamp(position) - self.config.bounds.min;
        let scaled = local / self.size * self.config.splits.as_vec3();
        let last = self.config.splits - UVec3::ONE;
        scaled.floor().as_uvec3().min(last)
    }

    /// Flat cell id of a position.
    #[must_use]
    pub fn cell_index(&self, position: Vec3) -> CellIndex {
        self.flatten(self.cell_coords(position))
    }

    /// Flatten per-axis coordinates into a cell id.
    ///
    /// Coordinates past the last cell are clamped onto it.
    #[must_use]
    pub fn flatten(&self, coords: UVec3) -> CellIndex {
        let s = self.config.splits;
        let c = coords.min(s - UVec3::ONE);
        CellIndex(c.x + c.y * s.x + c.z * s.x * s.y)
    }

    /// Recover per-axis coordinates from a cell id.
    #[must_use]
    pub fn unflatten(&self, cell: CellIndex) -> UVec3 {
        let s = self.config.splits;
        let plane = s.x * s.y;
        let z = cell.0 / plane;
        let rem = cell.0 % plane;
        UVec3::new(rem % s.x, rem / s.x, z)
    }

    /// World-space bounds of one cell.
    #[must_use]
    pub fn cell_bounds(&self, cell: CellIndex) -> Bounds {
        let step = self.cell_size();
        let min = self.config.bounds.min + self.unflatten(cell).as_vec3() * step;
        Bounds::from_min_max(min, min + step)
    }

    /// Every cell that may hold an entity within `radius` of `center`.
    ///
    /// Conservative: returns all cells covered by the sphere's bounding box,
    /// clamped the same way entity positions are. Ascending cell order.
    #[must_use]
    pub fn cells_in_radius(&self, center: Vec3, radius: f32) -> Vec<CellIndex> {
        let reach = Vec3::splat(radius.max(0.0));
        let lo = self.cell_coords(center - reach);
        let hi = self.cell_coords(center + reach);

        let mut cells = Vec::with_capacity(
            ((hi.x - lo.x + 1) * (hi.y - lo.y + 1) * (hi.z - lo.z + 1)) as usize,
        );
        for z in lo.z..=hi.z {
            for y in lo.y..=hi.y {
                for x in lo.x..=hi.x {
                    cells.push(self.flatten(UVec3::new(x, y, z)));
                }
            }
        }
        cells
    }
}

impl Default for SpatialGrid {
    fn default() -> Self {
        let config = GridConfig::default();
        Self {
            size: config.bounds.size(),
            config,
        }
    }
}
