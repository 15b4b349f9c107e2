//! The node store boundary.
//!
//! The engine never writes anything. A host owns durable state behind
//! [`NodeStore`], hands the engine a [`Snapshot`], and applies the resulting
//! patches in one atomic write guarded by the snapshot's [`Revision`].

mod memory;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Node, NodeId, Patch};

pub use memory::MemoryStore;

/// Monotonic version of a board; bumped by every successful write.
pub type Revision = u64;

/// A root scope: one independent forest of work items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardId(pub Uuid);

impl BoardId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Every node of a board at one revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub board_id: BoardId,
    pub revision: Revision,
    pub nodes: Vec<Node>,
}

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Another writer committed since the snapshot was taken. Re-snapshot and
    /// re-plan to retry.
    #[error("Stale write: board is at revision {actual}, plan was computed at {expected}")]
    Conflict {
        expected: Revision,
        actual: Revision,
    },

    #[error("Board not found: {0}")]
    UnknownBoard(BoardId),

    #[error("Node not found: {0}")]
    UnknownNode(NodeId),

    #[error("Invalid placement: {0}")]
    InvalidPlacement(String),

    #[error("Node {0} still has children")]
    HasChildren(NodeId),
}

pub trait NodeStore {
    /// Current snapshot of `board`.
    fn list_nodes(&self, board: BoardId) -> Result<Snapshot, StoreError>;

    /// Apply `patches` atomically if `board` is still at `base`.
    ///
    /// Returns the new revision. On error nothing has been written.
    fn apply_patches(
        &self,
        board: BoardId,
        base: Revision,
        patches: &[Patch],
    ) -> Result<Revision, StoreError>;
}
