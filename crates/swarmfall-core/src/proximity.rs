//! Proximity and collision queries.
//!
//! Two queries, both read-only:
//! - [`find_closest`]: nearest candidate whose z lies in a window
//! - [`radius_overlap`]: candidates whose collision sphere overlaps a sphere
//!
//! Consequences (destroying what was hit, spawning impacts) are recorded as
//! intents by the calling pass.
//!
//! # Candidate sets
//!
//! [`CandidateSet`] gathers every targetable entity once per pass, in slot
//! order, bucketed by grid cell. A pass builds it in
//! [`Pass::prepare`](crate::pass::Pass::prepare) and shares it across
//! workers, so per-entity queries only scan the cells they need.
//!
//! # Tie breaking
//!
//! Both queries walk candidates in the order given and use strict
//! comparisons, so the earliest candidate wins a tie. With slot-ordered
//! input this makes results deterministic.

use std::collections::HashMap;

use glam::Vec3;
use quadrant::CellIndex;
use serde::{Deserialize, Serialize};

use crate::component::{CellAssignment, Targetable, Transform};
use crate::entity::Entity;
use crate::view::PassView;

pub use crate::component::CollisionTag;

// =============================================================================
// Closest
// =============================================================================

/// Inclusive z window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZRange {
    /// Lowest accepted z
    pub min: f32,
    /// Highest accepted z
    pub max: f32,
}

impl ZRange {
    /// Accepts every z.
    pub const UNBOUNDED: Self = Self {
        min: f32::NEG_INFINITY,
        max: f32::INFINITY,
    };

    /// A window from `min` to `max`, both inclusive.
    #[must_use]
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Whether `z` lies inside the window.
    #[must_use]
    pub fn contains(&self, z: f32) -> bool {
        z >= self.min && z <= self.max
    }
}

impl Default for ZRange {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// Result of [`find_closest`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Closest {
    /// The nearest candidate
    pub entity: Entity,
    /// Its position in the candidate sequence
    pub index: usize,
    /// Squared distance to the seeker
    pub distance_squared: f32,
}

/// Nearest candidate to `seeker` whose z is inside `z_range`.
///
/// # Example
///
/// ```
/// use glam::Vec3;
/// use swarmfall_core::entity::Entity;
/// use swarmfall_core::proximity::{find_closest, ZRange};
///
/// let a = Entity::from_raw(0, 0);
/// let b = Entity::from_raw(1, 0);
/// let candidates = [(a, Vec3::new(0.0, 0.0, -5.0)), (b, Vec3::new(0.0, 0.0, 10.0))];
///
/// let hit = find_closest(Vec3::ZERO, ZRange::new(0.0, 40.0), candidates).unwrap();
/// assert_eq!(hit.entity, b);
/// assert_eq!(hit.index, 1);
/// ```
pub fn find_closest(
    seeker: Vec3,
    z_range: ZRange,
    candidates: impl IntoIterator<Item = (Entity, Vec3)>,
) -> Option<Closest> {
    let mut best: Option<Closest> = None;
    for (index, (entity, position)) in candidates.into_iter().enumerate() {
        if !z_range.contains(position.z) {
            continue;
        }
        let distance_squared = seeker.distance_squared(position);
        if best.map_or(true, |b| distance_squared < b.distance_squared) {
            best = Some(Closest {
                entity,
                index,
                distance_squared,
            });
        }
    }
    best
}

// =============================================================================
// Overlap
// =============================================================================

/// How many overlaps a query reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HitPolicy {
    /// Stop at the first overlap
    First,
    /// Report every overlap
    All,
}

/// A targetable entity as seen by collision queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// The entity
    pub entity: Entity,
    /// World position
    pub position: Vec3,
    /// Collision sphere radius
    pub radius: f32,
    /// Collision channel
    pub tag: CollisionTag,
    /// Assigned cell, if any
    pub cell: Option<CellIndex>,
}

impl Candidate {
    /// Whether this candidate's sphere overlaps a sphere at `center`.
    ///
    /// Touching spheres do not overlap.
    #[must_use]
    pub fn overlaps(&self, center: Vec3, radius: f32) -> bool {
        let reach = radius + self.radius;
        self.position.distance_squared(center) < reach * reach
    }
}

/// Candidates whose tag matches `filter` and whose sphere overlaps the sphere
/// at `center`, in input order.
pub fn radius_overlap<'c>(
    center: Vec3,
    radius: f32,
    candidates: impl IntoIterator<Item = &'c Candidate>,
    filter: CollisionTag,
    policy: HitPolicy,
) -> Vec<&'c Candidate> {
    let mut hits = candidates
        .into_iter()
        .filter(|c| filter.matches(c.tag) && c.overlaps(center, radius));
    match policy {
        HitPolicy::First => hits.next().into_iter().collect(),
        HitPolicy::All => hits.collect(),
    }
}

// =============================================================================
// Candidate Set
// =============================================================================

/// Slot-ordered targetable entities, bucketed by cell.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
    by_cell: HashMap<CellIndex, Vec<usize>>,
}

impl CandidateSet {
    /// Gather every live, non-dying entity with a [`Targetable`] and a
    /// [`Transform`].
    ///
    /// The view must allow reads of `Targetable`, `Transform` and
    /// `CellAssignment`.
    #[must_use]
    pub fn from_view(view: &PassView<'_>) -> Self {
        view.iter::<Targetable>()
            .filter(|(entity, _)| !view.is_dying(*entity))
            .filter_map(|(entity, targetable)| {
                let transform = view.get::<Transform>(entity)?;
                let cell = view
                    .get::<CellAssignment>(entity)
                    .and_then(CellAssignment::assigned_cell);
                Some(Candidate {
                    entity,
                    position: transform.position,
                    radius: targetable.radius,
                    tag: targetable.tag,
                    cell,
                })
            })
            .collect()
    }

    /// All candidates in slot order.
    #[must_use]
    pub fn all(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether there are no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidates assigned to `cell`, in slot order.
    pub fn in_cell(&self, cell: CellIndex) -> impl Iterator<Item = &Candidate> + '_ {
        self.by_cell
            .get(&cell)
            .into_iter()
            .flatten()
            .map(|&i| &self.candidates[i])
    }

    /// Candidates assigned to any of `cells`, in slot order.
    #[must_use]
    pub fn in_cells(&self, cells: &[CellIndex]) -> Vec<&Candidate> {
        let mut indices: Vec<usize> = cells
            .iter()
            .filter_map(|cell| self.by_cell.get(cell))
            .flatten()
            .copied()
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices.into_iter().map(|i| &self.candidates[i]).collect()
    }
}

impl FromIterator<Candidate> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = Candidate>>(iter: I) -> Self {
        let candidates: Vec<Candidate> = iter.into_iter().collect();
        let mut by_cell: HashMap<CellIndex, Vec<usize>> = HashMap::new();
        for (i, candidate) in candidates.iter().enumerate() {
            if let Some(cell) = candidate.cell {
                by_cell.entry(cell).or_default().push(i);
            }
        }
        Self {
            candidates,
            by_cell,
        }
    }
}
