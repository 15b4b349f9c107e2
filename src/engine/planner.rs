//! Validation and key computation for a single move.

use serde::Serialize;
use thiserror::Error;

use super::drop::DropZones;
use super::index::TreeIndex;
use super::keys::{AllocatorError, KeySpacing};
use super::lattice::TypeLattice;
use super::rebalance::rebalance;
use crate::config::EngineConfig;
use crate::models::{DropIntent, Gesture, MovePlan, Node, NodeId, OrderKey, Patch, WorkItemType};

/// Why a move was refused. Nothing has been written when one of these is
/// returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("cannot drop a node onto itself")]
    SelfDrop,

    #[error("node {dragged} cannot move under its own descendant {parent}")]
    Cycle { dragged: NodeId, parent: NodeId },

    #[error("a {child} cannot be placed {}", placement(.parent))]
    IllegalType {
        /// `None` when the destination is the top level.
        parent: Option<WorkItemType>,
        child: WorkItemType,
    },

    #[error("node {0} not found")]
    UnknownNode(NodeId),

    #[error("node {0} is detached from the tree")]
    Orphaned(NodeId),

    #[error("order key range exhausted under the destination parent")]
    KeySpaceExhausted,
}

fn placement(parent: &Option<WorkItemType>) -> String {
    match parent {
        Some(parent) => format!("under a {parent}"),
        None => "at the top level".to_string(),
    }
}

/// A plan together with the intent it was computed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMove {
    pub intent: DropIntent,
    pub plan: MovePlan,
}

/// Turns drop requests into [`MovePlan`]s against one snapshot.
///
/// The planner borrows its configuration and holds no state of its own, so
/// every call is a pure function of its arguments.
#[derive(Debug, Clone, Copy)]
pub struct MovePlanner<'a> {
    lattice: &'a TypeLattice,
    zones: DropZones,
    spacing: KeySpacing,
}

impl<'a> MovePlanner<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            lattice: &config.lattice,
            zones: config.drop,
            spacing: config.keys,
        }
    }

    /// Classify `gesture` and plan the resulting move.
    pub fn plan_gesture(
        &self,
        tree: &TreeIndex,
        gesture: &Gesture,
    ) -> Result<PlannedMove, MoveError> {
        if gesture.dragged_id == gesture.target_id {
            return Err(MoveError::SelfDrop);
        }
        let dragged = lookup(tree, gesture.dragged_id)?;
        let target = lookup(tree, gesture.target_id)?;
        let intent = self
            .zones
            .classify(gesture.pointer_y, dragged.kind, target.kind, self.lattice);
        let plan = self.plan(tree, gesture.dragged_id, gesture.target_id, intent)?;
        Ok(PlannedMove { intent, plan })
    }

    /// Plan moving `dragged_id` relative to `target_id`.
    pub fn plan(
        &self,
        tree: &TreeIndex,
        dragged_id: NodeId,
        target_id: NodeId,
        intent: DropIntent,
    ) -> Result<MovePlan, MoveError> {
        if dragged_id == target_id {
            return Err(MoveError::SelfDrop);
        }
        let dragged = lookup(tree, dragged_id)?;
        let target = lookup(tree, target_id)?;
        if tree.is_orphaned(target_id) {
            return Err(MoveError::Orphaned(target_id));
        }

        let parent_id = match intent {
            DropIntent::Inside => Some(target_id),
            DropIntent::Before | DropIntent::After => target.parent_id,
        };
        if let Some(parent) = parent_id {
            if tree.would_create_cycle(dragged_id, Some(parent)) {
                return Err(MoveError::Cycle {
                    dragged: dragged_id,
                    parent,
                });
            }
        }

        // Reordering within the current parent keeps an already legal placement.
        let reparenting = dragged.parent_id != parent_id;
        if reparenting {
            let parent_kind = match parent_id {
                Some(id) => Some(lookup(tree, id)?.kind),
                None => None,
            };
            if !self.lattice.can_place(parent_kind, dragged.kind) {
                return Err(MoveError::IllegalType {
                    parent: parent_kind,
                    child: dragged.kind,
                });
            }
        }

        let current = tree.children_of(parent_id);
        let siblings: Vec<NodeId> = current
            .iter()
            .copied()
            .filter(|id| *id != dragged_id)
            .collect();
        let slot = match intent {
            DropIntent::Inside => siblings.len(),
            DropIntent::Before | DropIntent::After => {
                let at = siblings
                    .iter()
                    .position(|id| *id == target_id)
                    .ok_or(MoveError::UnknownNode(target_id))?;
                if intent == DropIntent::After {
                    at + 1
                } else {
                    at
                }
            }
        };

        if !reparenting && current.iter().position(|id| *id == dragged_id) == Some(slot) {
            tracing::debug!(dragged = %dragged_id, ?intent, "move is a no-op");
            return Ok(MovePlan::noop());
        }

        let key_of = |id: &NodeId| tree.get(*id).map(|n| n.order);
        let lower = slot
            .checked_sub(1)
            .and_then(|i| siblings.get(i))
            .and_then(key_of);
        let upper = siblings.get(slot).and_then(key_of);

        let plan = match self.spacing.key_between(lower, upper) {
            Ok(order) => MovePlan {
                patches: vec![Patch {
                    id: dragged_id,
                    parent_id,
                    order,
                }],
                rebalance_patches: Vec::new(),
            },
            Err(AllocatorError::NeedsRebalance) => {
                let mut ordered = siblings;
                ordered.insert(slot, dragged_id);
                self.rebalanced(tree, dragged_id, parent_id, &ordered)?
            }
            Err(AllocatorError::Exhausted) => return Err(MoveError::KeySpaceExhausted),
        };

        tracing::debug!(
            dragged = %dragged_id,
            ?intent,
            patches = plan.len(),
            rebalanced = plan.rebalanced(),
            "move planned"
        );
        Ok(plan)
    }

    /// Re-space `ordered` (already containing the dragged node in its new
    /// slot) and split the batch into the moved node and its siblings.
    fn rebalanced(
        &self,
        tree: &TreeIndex,
        dragged_id: NodeId,
        parent_id: Option<NodeId>,
        ordered: &[NodeId],
    ) -> Result<MovePlan, MoveError> {
        let batch =
            rebalance(ordered, &self.spacing).map_err(|_| MoveError::KeySpaceExhausted)?;
        tracing::debug!(parent = ?parent_id, siblings = ordered.len(), "rebalancing siblings");

        let mut plan = MovePlan::noop();
        for (id, order) in batch {
            let patch = Patch {
                id,
                parent_id,
                order,
            };
            if id == dragged_id {
                plan.patches.push(patch);
            } else if tree.get(id).map(|n| n.order) != Some(order) {
                plan.rebalance_patches.push(patch);
            }
        }
        Ok(plan)
    }

    /// Key for a new node appended under `parent_id`.
    pub fn end_of_list_key(
        &self,
        tree: &TreeIndex,
        parent_id: Option<NodeId>,
    ) -> Result<OrderKey, AllocatorError> {
        let last = tree
            .children_of(parent_id)
            .last()
            .and_then(|id| tree.get(*id))
            .map(|n| n.order);
        self.spacing.key_between(last, None)
    }
}

fn lookup(tree: &TreeIndex, id: NodeId) -> Result<&Node, MoveError> {
    tree.get(id).ok_or(MoveError::UnknownNode(id))
}

/// Plan a move with the default configuration.
pub fn plan(
    dragged_id: NodeId,
    target_id: NodeId,
    intent: DropIntent,
    tree: &TreeIndex,
) -> Result<MovePlan, MoveError> {
    let config = EngineConfig::default();
    MovePlanner::new(&config).plan(tree, dragged_id, target_id, intent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use WorkItemType::*;

    struct Board {
        nodes: Vec<Node>,
    }

    impl Board {
        fn new() -> Self {
            Self { nodes: Vec::new() }
        }

        fn add(&mut self, kind: WorkItemType, parent_id: Option<NodeId>, order: f64) -> NodeId {
            self.add_key(kind, parent_id, key(order))
        }

        fn add_key(
            &mut self,
            kind: WorkItemType,
            parent_id: Option<NodeId>,
            order: OrderKey,
        ) -> NodeId {
            let id = NodeId::random();
            self.nodes.push(Node {
                id,
                kind,
                parent_id,
                order,
                title: format!("{kind}"),
            });
            id
        }

        fn index(&self) -> TreeIndex {
            TreeIndex::build(self.nodes.clone())
        }
    }

    fn key(v: f64) -> OrderKey {
        OrderKey::try_from(v).unwrap()
    }

    #[test]
    fn self_drop_is_rejected_first() {
        let index = TreeIndex::default();
        let id = NodeId::random();
        assert_eq!(plan(id, id, DropIntent::Inside, &index), Err(MoveError::SelfDrop));
    }

    #[test]
    fn unknown_nodes_are_rejected() {
        let mut board = Board::new();
        let epic = board.add(Epic, None, 1000.0);
        let ghost = NodeId::random();
        let index = board.index();
        assert_eq!(
            plan(ghost, epic, DropIntent::Inside, &index),
            Err(MoveError::UnknownNode(ghost))
        );
        assert_eq!(
            plan(epic, ghost, DropIntent::After, &index),
            Err(MoveError::UnknownNode(ghost))
        );
    }

    #[test]
    fn reorders_between_neighbours() {
        let mut board = Board::new();
        let epic = board.add(Epic, None, 1000.0);
        board.add(Story, Some(epic), 1000.0);
        let b = board.add(Story, Some(epic), 2000.0);
        let c = board.add(Story, Some(epic), 3000.0);
        let index = board.index();

        let plan = plan(c, b, DropIntent::Before, &index).unwrap();
        assert_eq!(
            plan.patches,
            vec![Patch {
                id: c,
                parent_id: Some(epic),
                order: key(1500.0)
            }]
        );
        assert!(!plan.rebalanced());
    }

    #[test]
    fn before_first_sibling_prepends() {
        let mut board = Board::new();
        let epic = board.add(Epic, None, 1000.0);
        let a = board.add(Story, Some(epic), 1000.0);
        let b = board.add(Story, Some(epic), 2000.0);
        let index = board.index();

        let plan = plan(b, a, DropIntent::Before, &index).unwrap();
        assert_eq!(plan.patches[0].order, key(0.0));
    }

    #[test]
    fn dropping_into_current_slot_is_a_noop() {
        let mut board = Board::new();
        let epic = board.add(Epic, None, 1000.0);
        let a = board.add(Story, Some(epic), 1000.0);
        let b = board.add(Story, Some(epic), 2000.0);
        let index = board.index();

        assert!(plan(a, b, DropIntent::Before, &index).unwrap().is_noop());
        assert!(plan(b, a, DropIntent::After, &index).unwrap().is_noop());
        assert!(plan(b, epic, DropIntent::Inside, &index).unwrap().is_noop());
        assert!(!plan(a, epic, DropIntent::Inside, &index).unwrap().is_noop());
    }

    #[test]
    fn reparenting_rechecks_type_legality() {
        let mut board = Board::new();
        let epic = board.add(Epic, None, 1000.0);
        let feature = board.add(Feature, Some(epic), 1000.0);
        let story = board.add(Story, Some(feature), 1000.0);
        let task = board.add(Task, Some(story), 1000.0);
        let index = board.index();

        assert_eq!(
            plan(task, feature, DropIntent::Inside, &index),
            Err(MoveError::IllegalType {
                parent: Some(Feature),
                child: Task
            })
        );
        assert_eq!(
            plan(story, epic, DropIntent::After, &index),
            Err(MoveError::IllegalType {
                parent: None,
                child: Story
            })
        );
        assert!(plan(story, feature, DropIntent::After, &index).is_ok());
    }

    #[test]
    fn moving_under_a_descendant_is_a_cycle() {
        let mut board = Board::new();
        let epic = board.add(Epic, None, 1000.0);
        let feature = board.add(Feature, Some(epic), 1000.0);
        let story = board.add(Story, Some(feature), 1000.0);
        let index = board.index();

        assert_eq!(
            plan(feature, story, DropIntent::Before, &index),
            Err(MoveError::Cycle {
                dragged: feature,
                parent: feature
            })
        );
        assert!(matches!(
            plan(epic, story, DropIntent::Inside, &index),
            Err(MoveError::Cycle { .. })
        ));
    }

    #[test]
    fn rebalance_past_the_key_range_is_exhausted() {
        let base = OrderKey::from_ticks(crate::models::MAX_TICKS - 500);
        let config = EngineConfig {
            keys: KeySpacing {
                base_order: base,
                ..KeySpacing::default()
            },
            ..EngineConfig::default()
        };
        let mut board = Board::new();
        let epic = board.add(Epic, None, 1000.0);
        let c = board.add(Story, Some(epic), 0.0);
        board.add_key(Story, Some(epic), base);
        let b = board.add_key(Story, Some(epic), OrderKey::from_ticks(base.ticks() + 100));
        let index = board.index();

        let result = MovePlanner::new(&config).plan(&index, c, b, DropIntent::Before);
        assert_eq!(result, Err(MoveError::KeySpaceExhausted));
    }

    #[test]
    fn orphaned_targets_are_rejected() {
        let mut board = Board::new();
        let epic = board.add(Epic, None, 1000.0);
        let lost = board.add(Story, Some(NodeId::random()), 1000.0);
        let story = board.add(Story, Some(epic), 1000.0);
        let index = board.index();

        assert_eq!(
            plan(story, lost, DropIntent::After, &index),
            Err(MoveError::Orphaned(lost))
        );
        // An orphan can be dragged back into the tree.
        let repair = plan(lost, story, DropIntent::After, &index).unwrap();
        assert_eq!(repair.patches[0].parent_id, Some(epic));
    }

    #[test]
    fn crowded_gap_rebalances_in_the_same_plan() {
        let mut board = Board::new();
        let epic = board.add(Epic, None, 1000.0);
        let first = board.add(Story, Some(epic), 100.0);
        let second = board.add(Story, Some(epic), 100.0001);
        let third = board.add(Story, Some(epic), 5000.0);
        let index = board.index();

        let plan = plan(third, second, DropIntent::Before, &index).unwrap();
        assert_eq!(
            plan.patches,
            vec![Patch {
                id: third,
                parent_id: Some(epic),
                order: key(2000.0)
            }]
        );
        assert_eq!(
            plan.rebalance_patches,
            vec![
                Patch {
                    id: first,
                    parent_id: Some(epic),
                    order: key(1000.0)
                },
                Patch {
                    id: second,
                    parent_id: Some(epic),
                    order: key(3000.0)
                },
            ]
        );
    }

    #[test]
    fn rebalance_skips_siblings_already_in_place() {
        let mut board = Board::new();
        let epic = board.add(Epic, None, 1000.0);
        let first = board.add(Story, Some(epic), 1000.0);
        let second = board.add(Story, Some(epic), 1000.0);
        let mover = board.add(Story, Some(epic), 9000.0);
        let index = board.index();

        // `first` and `second` collide; inserting between them re-spaces the list.
        let (low, high) = {
            let kids = index.children_of(Some(epic));
            (kids[0], kids[1])
        };
        let plan = plan(mover, high, DropIntent::Before, &index).unwrap();
        assert_eq!(plan.patches[0].order, key(2000.0));
        assert_eq!(plan.rebalance_patches.len(), 1);
        assert_eq!(plan.rebalance_patches[0].id, high);
        assert!(low == first || low == second);
    }

    #[test]
    fn gesture_downgrade_still_validates_parent() {
        let mut board = Board::new();
        let epic = board.add(Epic, None, 1000.0);
        let feature = board.add(Feature, Some(epic), 1000.0);
        let story = board.add(Story, Some(epic), 2000.0);
        let task = board.add(Task, Some(story), 1000.0);
        let index = board.index();
        let config = EngineConfig::default();
        let planner = MovePlanner::new(&config);

        let result = planner.plan_gesture(
            &index,
            &Gesture {
                dragged_id: feature,
                target_id: task,
                pointer_y: 0.5,
            },
        );
        assert_eq!(
            result,
            Err(MoveError::IllegalType {
                parent: Some(Story),
                child: Feature
            })
        );
    }

    #[test]
    fn end_of_list_key_follows_last_child() {
        let mut board = Board::new();
        let epic = board.add(Epic, None, 1000.0);
        board.add(Story, Some(epic), 1000.0);
        board.add(Story, Some(epic), 4500.0);
        let index = board.index();
        let config = EngineConfig::default();
        let planner = MovePlanner::new(&config);

        assert_eq!(planner.end_of_list_key(&index, Some(epic)), Ok(key(5500.0)));
        assert_eq!(planner.end_of_list_key(&index, None), Ok(key(2000.0)));
        assert_eq!(
            planner.end_of_list_key(&TreeIndex::default(), None),
            Ok(key(1000.0))
        );
    }

    #[test]
    fn error_messages_name_the_placement() {
        let err = MoveError::IllegalType {
            parent: None,
            child: Story,
        };
        assert_eq!(err.to_string(), "a story cannot be placed at the top level");
        let err = MoveError::IllegalType {
            parent: Some(Task),
            child: Feature,
        };
        assert_eq!(err.to_string(), "a feature cannot be placed under a task");
    }
}
