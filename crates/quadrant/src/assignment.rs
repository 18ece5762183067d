//! Per-entity cell assignment and its refresh policy.
//!
//! Static geometry only needs its cell computed once; moving entities need it
//! recomputed every tick. [`RefreshMode`] encodes both policies as a small
//! state machine:
//!
//! ```text
//! Unassigned
//!   ├─► OneShotPending ──update──► OneShotDone       (frozen)
//!   └─► ContinuousPending ─update─► ContinuousDone ─┐
//!                                        ▲          │ update
//!                                        └──────────┘
//! ```

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::grid::{CellIndex, SpatialGrid};

/// Refresh policy and progress of one entity's cell assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RefreshMode {
    /// No policy chosen; never refreshed
    #[default]
    Unassigned = 0,
    /// Compute once on the next refresh
    OneShotPending = 1,
    /// Computed once and frozen
    OneShotDone = 2,
    /// Compute on the next refresh and every one after
    ContinuousPending = 3,
    /// Computed at least once, still refreshed every tick
    ContinuousDone = 4,
}

impl RefreshMode {
    /// Whether the next refresh should recompute the cell.
    #[must_use]
    pub const fn should_update(self) -> bool {
        !matches!(self, Self::Unassigned | Self::OneShotDone)
    }

    /// The mode after a refresh has recomputed the cell.
    #[must_use]
    pub const fn after_update(self) -> Self {
        match self {
            Self::OneShotPending => Self::OneShotDone,
            Self::ContinuousPending | Self::ContinuousDone => Self::ContinuousDone,
            other => other,
        }
    }

    /// Whether the cell has been computed at least once.
    #[must_use]
    pub const fn is_assigned(self) -> bool {
        matches!(self, Self::OneShotDone | Self::ContinuousDone)
    }

    /// Whether this is a one-shot policy (pending or done).
    #[must_use]
    pub const fn is_one_shot(self) -> bool {
        matches!(self, Self::OneShotPending | Self::OneShotDone)
    }

    /// The pending state for this mode's policy.
    #[must_use]
    pub const fn pending(self) -> Self {
        match self {
            Self::OneShotPending | Self::OneShotDone => Self::OneShotPending,
            Self::ContinuousPending | Self::ContinuousDone => Self::ContinuousPending,
            Self::Unassigned => Self::Unassigned,
        }
    }
}

/// An entity's cell id together with its refresh mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellAssignment {
    /// Last computed cell (meaningless until [`is_assigned`](Self::is_assigned))
    pub cell: CellIndex,
    /// Refresh policy and progress
    pub mode: RefreshMode,
}

impl CellAssignment {
    /// A one-shot assignment, computed on the next refresh then frozen.
    #[must_use]
    pub const fn one_shot() -> Self {
        Self {
            cell: CellIndex::new(0),
            mode: RefreshMode::OneShotPending,
        }
    }

    /// A continuous assignment, recomputed on every refresh.
    #[must_use]
    pub const fn continuous() -> Self {
        Self {
            cell: CellIndex::new(0),
            mode: RefreshMode::ContinuousPending,
        }
    }

    /// Whether the cell has been computed at least once.
    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        self.mode.is_assigned()
    }

    /// The assigned cell, if any.
    #[must_use]
    pub const fn assigned_cell(&self) -> Option<CellIndex> {
        if self.is_assigned() {
            Some(self.cell)
        } else {
            None
        }
    }

    /// Recompute the cell from `position` if the mode asks for it.
    ///
    /// Returns `true` when the cell was recomputed.
    pub fn refresh(&mut self, grid: &SpatialGrid, position: Vec3) -> bool {
        if !self.mode.should_update() {
            return false;
        }
        self.cell = grid.cell_index(position);
        self.mode = self.mode.after_update();
        true
    }

    /// Put the assignment back into its pending state.
    ///
    /// This is the only way to move a frozen one-shot entity to a new cell.
    pub fn reset(&mut self) {
        self.mode = self.mode.pending();
    }
}
