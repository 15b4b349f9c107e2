//! Classification of a drop position into a move intent.

use serde::{Deserialize, Serialize};

use super::lattice::TypeLattice;
use crate::models::{DropIntent, WorkItemType};

/// Fraction of the target's height that counts as its top or bottom edge.
pub const DEFAULT_EDGE_THRESHOLD: f64 = 0.25;

/// Vertical zoning of a drop target: a top edge, a bottom edge, and the
/// middle band between them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropZones {
    pub edge_threshold: f64,
}

impl Default for DropZones {
    fn default() -> Self {
        Self {
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
        }
    }
}

impl DropZones {
    /// The zone `pointer_y` falls in, ignoring type rules.
    ///
    /// Values outside `[0, 1]` are clamped. A non-finite position has no
    /// meaningful zone and resolves to `After`.
    pub fn zone(&self, pointer_y: f64) -> DropIntent {
        if !pointer_y.is_finite() {
            return DropIntent::After;
        }
        let y = pointer_y.clamp(0.0, 1.0);
        let t = self.edge_threshold;
        if y < t {
            DropIntent::Before
        } else if y > 1.0 - t {
            DropIntent::After
        } else {
            DropIntent::Inside
        }
    }

    /// Resolve a drop of `dragged` onto `target` at `pointer_y`.
    ///
    /// A middle-band drop onto a target that cannot contain the dragged type
    /// becomes `After`, never `Before`.
    pub fn classify(
        &self,
        pointer_y: f64,
        dragged: WorkItemType,
        target: WorkItemType,
        lattice: &TypeLattice,
    ) -> DropIntent {
        match self.zone(pointer_y) {
            DropIntent::Inside if !lattice.can_parent(target, dragged) => DropIntent::After,
            intent => intent,
        }
    }
}

/// [`DropZones::classify`] with the default threshold.
pub fn classify(
    pointer_y: f64,
    dragged: WorkItemType,
    target: WorkItemType,
    lattice: &TypeLattice,
) -> DropIntent {
    DropZones::default().classify(pointer_y, dragged, target, lattice)
}
