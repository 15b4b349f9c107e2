//! Snapshot → plan → apply, for hosts that talk to a [`NodeStore`].
//!
//! This is the only layer that logs outcomes. It never retries: on
//! [`StoreError::Conflict`] the caller decides whether to re-snapshot and
//! try the gesture again.

use thiserror::Error;

use crate::config::EngineConfig;
use crate::engine::{MoveError, MovePlanner, TreeIndex};
use crate::models::{DropIntent, Gesture, MovePlan};
use crate::store::{BoardId, NodeStore, Revision, StoreError};

/// A move either was refused by the engine or failed in the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
    #[error("Move rejected: {0}")]
    Rejected(#[from] MoveError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CommitError {
    /// Whether re-snapshotting and planning again could succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(StoreError::Conflict { .. }))
    }
}

/// What a committed move did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub intent: DropIntent,
    pub plan: MovePlan,
    /// Board revision after the write (unchanged for a no-op).
    pub revision: Revision,
}

/// Resolve `gesture` against a fresh snapshot of `board` and write the plan.
pub fn move_node<S: NodeStore>(
    store: &S,
    board: BoardId,
    gesture: &Gesture,
    config: &EngineConfig,
) -> Result<MoveOutcome, CommitError> {
    let snapshot = store.list_nodes(board)?;
    let base = snapshot.revision;
    let tree = TreeIndex::build(snapshot.nodes);

    let planned = match MovePlanner::new(config).plan_gesture(&tree, gesture) {
        Ok(planned) => planned,
        Err(e) => {
            tracing::info!(board = %board, dragged = %gesture.dragged_id, "move rejected: {}", e);
            return Err(e.into());
        }
    };

    if planned.plan.is_noop() {
        return Ok(MoveOutcome {
            intent: planned.intent,
            plan: planned.plan,
            revision: base,
        });
    }

    match store.apply_patches(board, base, &planned.plan.all_patches()) {
        Ok(revision) => {
            tracing::info!(
                board = %board,
                dragged = %gesture.dragged_id,
                intent = planned.intent.as_str(),
                patches = planned.plan.len(),
                revision,
                "move committed"
            );
            Ok(MoveOutcome {
                intent: planned.intent,
                plan: planned.plan,
                revision,
            })
        }
        Err(e) => {
            tracing::warn!(board = %board, base, "move not applied: {}", e);
            Err(e.into())
        }
    }
}
