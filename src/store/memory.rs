use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{BoardId, NodeStore, Revision, Snapshot, StoreError};
use crate::config::EngineConfig;
use crate::engine::{MovePlanner, TreeIndex};
use crate::models::{CreateNodeInput, Node, NodeId, Patch};

struct Board {
    name: String,
    revision: Revision,
    /// Insertion order; sibling order lives in the keys.
    nodes: Vec<Node>,
}

impl Board {
    fn find(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// In-process reference [`NodeStore`].
///
/// Each board carries a revision; writes against an older revision fail with
/// [`StoreError::Conflict`]. Cloning shares the underlying boards.
pub struct MemoryStore {
    boards: Arc<Mutex<HashMap<BoardId, Board>>>,
    config: Arc<EngineConfig>,
}

impl MemoryStore {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            boards: Arc::new(Mutex::new(HashMap::new())),
            config: Arc::new(config),
        }
    }

    // ============================================================
    // Board operations
    // ============================================================

    pub fn create_board(&self, name: &str) -> BoardId {
        let mut boards = self.boards.lock().expect("store lock poisoned");
        let id = BoardId::random();
        boards.insert(
            id,
            Board {
                name: name.to_string(),
                revision: 0,
                nodes: Vec::new(),
            },
        );
        id
    }

    pub fn board_name(&self, board: BoardId) -> Result<String, StoreError> {
        let boards = self.boards.lock().expect("store lock poisoned");
        boards
            .get(&board)
            .map(|b| b.name.clone())
            .ok_or(StoreError::UnknownBoard(board))
    }

    pub fn revision(&self, board: BoardId) -> Result<Revision, StoreError> {
        let boards = self.boards.lock().expect("store lock poisoned");
        boards
            .get(&board)
            .map(|b| b.revision)
            .ok_or(StoreError::UnknownBoard(board))
    }

    // ============================================================
    // Node operations
    // ============================================================

    /// Create a node at the end of its sibling list.
    pub fn create_node(&self, board: BoardId, input: CreateNodeInput) -> Result<Node, StoreError> {
        let mut boards = self.boards.lock().expect("store lock poisoned");
        let state = boards
            .get_mut(&board)
            .ok_or(StoreError::UnknownBoard(board))?;

        let parent_kind = match input.parent_id {
            Some(parent_id) => Some(
                state
                    .find(parent_id)
                    .ok_or(StoreError::UnknownNode(parent_id))?
                    .kind,
            ),
            None => None,
        };
        if !self.config.lattice.can_place(parent_kind, input.kind) {
            let place = match parent_kind {
                Some(parent) => format!("under a {parent}"),
                None => "at the top level".to_string(),
            };
            return Err(StoreError::InvalidPlacement(format!(
                "a {} cannot be created {place}",
                input.kind
            )));
        }

        let tree = TreeIndex::build(state.nodes.clone());
        let order = MovePlanner::new(&self.config)
            .end_of_list_key(&tree, input.parent_id)
            .map_err(|e| StoreError::InvalidPlacement(e.to_string()))?;

        let node = Node {
            id: NodeId::random(),
            kind: input.kind,
            parent_id: input.parent_id,
            order,
            title: input.title,
        };
        state.nodes.push(node.clone());
        state.revision += 1;
        Ok(node)
    }

    pub fn get_node(&self, board: BoardId, id: NodeId) -> Result<Option<Node>, StoreError> {
        let boards = self.boards.lock().expect("store lock poisoned");
        let state = boards.get(&board).ok_or(StoreError::UnknownBoard(board))?;
        Ok(state.find(id).cloned())
    }

    /// Children of `parent_id` sorted by order key; `None` lists the top level.
    pub fn get_children(
        &self,
        board: BoardId,
        parent_id: Option<NodeId>,
    ) -> Result<Vec<Node>, StoreError> {
        let boards = self.boards.lock().expect("store lock poisoned");
        let state = boards.get(&board).ok_or(StoreError::UnknownBoard(board))?;
        let mut children: Vec<Node> = state
            .nodes
            .iter()
            .filter(|n| n.parent_id == parent_id)
            .cloned()
            .collect();
        children.sort_by_key(|n| (n.order, n.id));
        Ok(children)
    }

    /// Delete a leaf node. Returns `false` if it did not exist.
    pub fn delete_node(&self, board: BoardId, id: NodeId) -> Result<bool, StoreError> {
        let mut boards = self.boards.lock().expect("store lock poisoned");
        let state = boards
            .get_mut(&board)
            .ok_or(StoreError::UnknownBoard(board))?;

        if state.nodes.iter().any(|n| n.parent_id == Some(id)) {
            return Err(StoreError::HasChildren(id));
        }
        let before = state.nodes.len();
        state.nodes.retain(|n| n.id != id);
        let removed = state.nodes.len() < before;
        if removed {
            state.revision += 1;
        }
        Ok(removed)
    }

    /// Insert nodes verbatim, keeping their ids and keys. Used to seed a board
    /// from an exported snapshot.
    pub fn import_nodes(
        &self,
        board: BoardId,
        nodes: impl IntoIterator<Item = Node>,
    ) -> Result<Revision, StoreError> {
        let mut boards = self.boards.lock().expect("store lock poisoned");
        let state = boards
            .get_mut(&board)
            .ok_or(StoreError::UnknownBoard(board))?;
        state.nodes.extend(nodes);
        state.revision += 1;
        Ok(state.revision)
    }
}

impl NodeStore for MemoryStore {
    fn list_nodes(&self, board: BoardId) -> Result<Snapshot, StoreError> {
        let boards = self.boards.lock().expect("store lock poisoned");
        let state = boards.get(&board).ok_or(StoreError::UnknownBoard(board))?;
        Ok(Snapshot {
            board_id: board,
            revision: state.revision,
            nodes: state.nodes.clone(),
        })
    }

    fn apply_patches(
        &self,
        board: BoardId,
        base: Revision,
        patches: &[Patch],
    ) -> Result<Revision, StoreError> {
        let mut boards = self.boards.lock().expect("store lock poisoned");
        let state = boards
            .get_mut(&board)
            .ok_or(StoreError::UnknownBoard(board))?;

        if state.revision != base {
            return Err(StoreError::Conflict {
                expected: base,
                actual: state.revision,
            });
        }
        if patches.is_empty() {
            return Ok(state.revision);
        }

        // Validate the whole batch before touching anything.
        for patch in patches {
            if state.find(patch.id).is_none() {
                return Err(StoreError::UnknownNode(patch.id));
            }
            if let Some(parent_id) = patch.parent_id {
                if state.find(parent_id).is_none() {
                    return Err(StoreError::UnknownNode(parent_id));
                }
            }
        }

        for patch in patches {
            if let Some(node) = state.nodes.iter_mut().find(|n| n.id == patch.id) {
                node.parent_id = patch.parent_id;
                node.order = patch.order;
            }
        }
        state.revision += 1;
        Ok(state.revision)
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            boards: self.boards.clone(),
            config: self.config.clone(),
        }
    }
}
