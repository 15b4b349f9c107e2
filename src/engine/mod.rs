//! The ordering engine: pure functions over an immutable snapshot.

mod drop;
mod index;
mod keys;
mod lattice;
mod planner;
mod rebalance;

pub use drop::{classify, DropZones, DEFAULT_EDGE_THRESHOLD};
pub use index::{Anomaly, TreeIndex, Violation};
pub use keys::{key_between, AllocatorError, KeySpacing, BASE_GAP, BASE_ORDER, MIN_GAP};
pub use lattice::{LatticeTable, TypeLattice};
pub use planner::{plan, MoveError, MovePlanner, PlannedMove};
pub use rebalance::rebalance;
