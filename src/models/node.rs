use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order_key::OrderKey;

/// Opaque identifier of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// A fresh random id. Used by stores when creating nodes.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for NodeId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The kind of a work item.
///
/// The set is closed: the type lattice matches on it exhaustively, so adding a
/// variant forces every containment rule to be revisited at compile time.
///
/// - `Epic`: Top-level outcome, the only type allowed at the root
/// - `Feature`: Capability delivered under an epic
/// - `Story`: User-facing slice of a feature (or directly of an epic)
/// - `Task`: Leaf unit of work under a story
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemType {
    Epic,
    Feature,
    Story,
    Task,
}

impl WorkItemType {
    pub const ALL: [WorkItemType; 4] = [Self::Epic, Self::Feature, Self::Story, Self::Task];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Epic => "epic",
            Self::Feature => "feature",
            Self::Story => "story",
            Self::Task => "task",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "epic" => Some(Self::Epic),
            "feature" => Some(Self::Feature),
            "story" => Some(Self::Story),
            "task" => Some(Self::Task),
            _ => None,
        }
    }

    /// Built-in containment rules, before any host configuration.
    pub fn default_children(&self) -> &'static [WorkItemType] {
        match self {
            Self::Epic => &[Self::Feature, Self::Story],
            Self::Feature => &[Self::Story],
            Self::Story => &[Self::Task],
            Self::Task => &[],
        }
    }

    /// Whether a node of this type may sit at the top level (`parent_id = None`).
    pub fn can_be_root(&self) -> bool {
        match self {
            Self::Epic => true,
            Self::Feature | Self::Story | Self::Task => false,
        }
    }
}

impl fmt::Display for WorkItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One work item as held by the node store.
///
/// Hierarchy is expressed only through the `parent_id` back-reference; children
/// are derived by [`TreeIndex`](crate::engine::TreeIndex) and never owned here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: WorkItemType,
    /// `None` only for top-level epics.
    pub parent_id: Option<NodeId>,
    /// Position among the siblings sharing `parent_id`.
    pub order: OrderKey,
    pub title: String,
}

/// Input for creating a node through a store.
///
/// The store assigns the id and places the node at the end of its sibling list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNodeInput {
    #[serde(rename = "type")]
    pub kind: WorkItemType,
    /// Parent node for nesting. `None` creates a top-level epic.
    pub parent_id: Option<NodeId>,
    pub title: String,
}
