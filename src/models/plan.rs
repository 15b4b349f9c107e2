use serde::{Deserialize, Serialize};

use super::node::NodeId;
use super::order_key::OrderKey;

/// The classified meaning of a drop gesture relative to its target.
///
/// - `Before`: Become the target's previous sibling
/// - `After`: Become the target's next sibling
/// - `Inside`: Become the target's last child
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DropIntent {
    Before,
    After,
    Inside,
}

impl DropIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
            Self::Inside => "inside",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "before" => Some(Self::Before),
            "after" => Some(Self::After),
            "inside" => Some(Self::Inside),
            _ => None,
        }
    }
}

/// A drag gesture as reported by the UI.
///
/// `pointer_y` is the pointer position relative to the target's vertical
/// bounds: `0.0` at the top edge, `1.0` at the bottom.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Gesture {
    pub dragged_id: NodeId,
    pub target_id: NodeId,
    pub pointer_y: f64,
}

/// A write of one node's placement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Patch {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub order: OrderKey,
}

/// The atomic batch of writes for one accepted move.
///
/// `patches` holds the moved node itself. `rebalance_patches` holds re-spaced
/// siblings under the destination parent when the move needed a rebalance; it
/// only lists siblings whose key actually changes. Both lists must be applied
/// together or not at all.
///
/// An empty plan means the move is a no-op (the node is already there).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MovePlan {
    pub patches: Vec<Patch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rebalance_patches: Vec<Patch>,
}

impl MovePlan {
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn is_noop(&self) -> bool {
        self.patches.is_empty() && self.rebalance_patches.is_empty()
    }

    pub fn rebalanced(&self) -> bool {
        !self.rebalance_patches.is_empty()
    }

    /// Every write in the plan, moved node first.
    pub fn all_patches(&self) -> Vec<Patch> {
        self.patches
            .iter()
            .chain(self.rebalance_patches.iter())
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.patches.len() + self.rebalance_patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_noop()
    }
}
