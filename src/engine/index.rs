//! Derived, disposable view over a flat snapshot of nodes.
//!
//! The index is an arena keyed by [`NodeId`]: entries hold the nodes, and
//! per-parent id lists hold the sibling order. Nothing points at anything
//! directly, so the whole view can be dropped and rebuilt from the store at
//! any time.
//!
//! Malformed snapshots do not fail the build. Duplicate ids, dangling parent
//! references and parent cycles are recorded as [`Anomaly`]s and the affected
//! nodes (with everything below them) are marked orphaned, while the rest of
//! the forest stays usable.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use super::lattice::TypeLattice;
use crate::models::{MovePlan, Node, NodeId, OrderKey, WorkItemType};

/// A structural defect found while building the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Anomaly {
    /// A later record reused an id; the first record wins.
    DuplicateId(NodeId),
    /// `parent_id` names a node that is not in the snapshot.
    MissingParent { id: NodeId, parent_id: NodeId },
    /// Following `parent_id` from `members[0]` leads back to it.
    Cycle { members: Vec<NodeId> },
}

/// A broken tree invariant, as reported by [`TreeIndex::audit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    Structural(Anomaly),
    NonEpicRoot {
        id: NodeId,
        kind: WorkItemType,
    },
    IllegalType {
        id: NodeId,
        parent_id: NodeId,
        parent: WorkItemType,
        child: WorkItemType,
    },
    DuplicateOrder {
        parent_id: Option<NodeId>,
        order: OrderKey,
        first: NodeId,
        second: NodeId,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structural(Anomaly::DuplicateId(id)) => write!(f, "duplicate node id {id}"),
            Self::Structural(Anomaly::MissingParent { id, parent_id }) => {
                write!(f, "node {id} references missing parent {parent_id}")
            }
            Self::Structural(Anomaly::Cycle { members }) => {
                write!(f, "parent cycle through {} nodes starting at ", members.len())?;
                match members.first() {
                    Some(id) => write!(f, "{id}"),
                    None => write!(f, "?"),
                }
            }
            Self::NonEpicRoot { id, kind } => write!(f, "top-level node {id} is a {kind}"),
            Self::IllegalType {
                id,
                parent_id,
                parent,
                child,
            } => write!(f, "{child} {id} cannot live under {parent} {parent_id}"),
            Self::DuplicateOrder {
                order,
                first,
                second,
                ..
            } => write!(f, "siblings {first} and {second} share order {order}"),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    node: Node,
    orphaned: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    entries: HashMap<NodeId, Entry>,
    /// Ids in snapshot order, for deterministic reporting.
    ids: Vec<NodeId>,
    /// Sibling lists sorted by `(order, id)`, keyed by parent.
    children: HashMap<Option<NodeId>, Vec<NodeId>>,
    /// Records dropped because their id was already taken.
    discarded: Vec<Node>,
    anomalies: Vec<Anomaly>,
}

impl TreeIndex {
    pub fn build(nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut index = Self::default();
        for node in nodes {
            if index.entries.contains_key(&node.id) {
                index.anomalies.push(Anomaly::DuplicateId(node.id));
                index.discarded.push(node);
                continue;
            }
            index.ids.push(node.id);
            index.entries.insert(
                node.id,
                Entry {
                    node,
                    orphaned: false,
                },
            );
        }
        index.derive();
        index
    }

    /// Recompute sibling lists, orphan flags and anomalies from `entries`.
    fn derive(&mut self) {
        self.anomalies.retain(|a| matches!(a, Anomaly::DuplicateId(_)));
        self.children.clear();
        for id in &self.ids {
            let parent_id = self.entries[id].node.parent_id;
            self.children.entry(parent_id).or_default().push(*id);
        }
        let entries = &self.entries;
        for list in self.children.values_mut() {
            sort_siblings(list, entries);
        }

        // Everything reachable from the top level is attached. A node has one
        // parent, so a cycle can never be entered from a root.
        let mut attached = HashSet::new();
        let mut stack: Vec<NodeId> = self.children.get(&None).cloned().unwrap_or_default();
        while let Some(id) = stack.pop() {
            if attached.insert(id) {
                if let Some(kids) = self.children.get(&Some(id)) {
                    stack.extend(kids.iter().copied());
                }
            }
        }

        let mut examined: HashSet<NodeId> = HashSet::new();
        let mut found = Vec::new();
        for id in &self.ids {
            if attached.contains(id) || examined.contains(id) {
                continue;
            }
            // The parent of an orphan is missing or itself orphaned, so this
            // walk stays inside the orphaned part of the snapshot.
            let mut path: Vec<NodeId> = Vec::new();
            let mut on_path: HashMap<NodeId, usize> = HashMap::new();
            let mut current = *id;
            while !examined.contains(&current) {
                on_path.insert(current, path.len());
                path.push(current);
                let Some(parent_id) = self.entries[&current].node.parent_id else {
                    break;
                };
                if !self.entries.contains_key(&parent_id) {
                    found.push(Anomaly::MissingParent {
                        id: current,
                        parent_id,
                    });
                    break;
                }
                if let Some(&start) = on_path.get(&parent_id) {
                    found.push(Anomaly::Cycle {
                        members: path[start..].to_vec(),
                    });
                    break;
                }
                current = parent_id;
            }
            examined.extend(path);
        }

        for (id, entry) in self.entries.iter_mut() {
            entry.orphaned = !attached.contains(id);
        }
        self.anomalies.extend(found);

        if !examined.is_empty() {
            tracing::warn!(
                orphaned = examined.len(),
                anomalies = self.anomalies.len(),
                "tree index orphaned nodes"
            );
        }
    }

    // ============================================================
    // Lookups
    // ============================================================

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.entries.get(&id).map(|e| &e.node)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Nodes in snapshot order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.ids.iter().map(|id| &self.entries[id].node)
    }

    /// Children of `parent_id` sorted by order key; `None` lists the top level.
    pub fn children_of(&self, parent_id: Option<NodeId>) -> &[NodeId] {
        self.children
            .get(&parent_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn roots(&self) -> &[NodeId] {
        self.children_of(None)
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent_id)
    }

    /// Index of `id` within its sibling list.
    pub fn position_of(&self, id: NodeId) -> Option<usize> {
        let node = self.get(id)?;
        self.children_of(node.parent_id)
            .iter()
            .position(|sibling| *sibling == id)
    }

    /// Ancestors of `id`, root first, ending with its parent.
    ///
    /// Stops at a missing parent and never repeats a node, so this terminates on
    /// orphaned cycles as well.
    pub fn ancestors_of(&self, id: NodeId) -> Vec<NodeId> {
        let mut ancestors = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = self.parent_of(id);
        while let Some(parent_id) = current {
            if !self.contains(parent_id) || !seen.insert(parent_id) {
                break;
            }
            ancestors.push(parent_id);
            current = self.parent_of(parent_id);
        }
        ancestors.reverse();
        ancestors
    }

    /// Whether putting `id` under `proposed_parent` would make it its own ancestor.
    pub fn would_create_cycle(&self, id: NodeId, proposed_parent: Option<NodeId>) -> bool {
        match proposed_parent {
            None => false,
            Some(parent_id) if parent_id == id => true,
            Some(parent_id) => self.ancestors_of(parent_id).contains(&id),
        }
    }

    /// Number of ancestors; `0` for top-level nodes.
    pub fn depth_of(&self, id: NodeId) -> Option<usize> {
        self.get(id).map(|_| self.ancestors_of(id).len())
    }

    /// Every node below `id` in pre-order.
    pub fn descendants_of(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut stack: Vec<NodeId> = self.children_of(Some(id)).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            out.push(next);
            stack.extend(self.children_of(Some(next)).iter().rev().copied());
        }
        out
    }

    pub fn is_orphaned(&self, id: NodeId) -> bool {
        self.entries.get(&id).is_some_and(|e| e.orphaned)
    }

    /// Orphaned nodes in snapshot order.
    pub fn orphans(&self) -> Vec<NodeId> {
        self.ids
            .iter()
            .filter(|id| self.entries[*id].orphaned)
            .copied()
            .collect()
    }

    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    // ============================================================
    // Invariants
    // ============================================================

    /// Check root typing, type legality, sibling uniqueness and structure.
    pub fn audit(&self, lattice: &TypeLattice) -> Vec<Violation> {
        let mut violations: Vec<Violation> = self
            .anomalies
            .iter()
            .cloned()
            .map(Violation::Structural)
            .collect();

        for node in self.nodes() {
            match node.parent_id {
                None if !lattice.can_be_root(node.kind) => {
                    violations.push(Violation::NonEpicRoot {
                        id: node.id,
                        kind: node.kind,
                    });
                }
                None => {}
                Some(parent_id) => {
                    if let Some(parent) = self.get(parent_id) {
                        if !lattice.can_parent(parent.kind, node.kind) {
                            violations.push(Violation::IllegalType {
                                id: node.id,
                                parent_id,
                                parent: parent.kind,
                                child: node.kind,
                            });
                        }
                    }
                }
            }
        }

        let parents = std::iter::once(None).chain(self.ids.iter().map(|id| Some(*id)));
        for parent_id in parents {
            for pair in self.children_of(parent_id).windows(2) {
                let first = &self.entries[&pair[0]].node;
                let second = &self.entries[&pair[1]].node;
                if first.order == second.order {
                    violations.push(Violation::DuplicateOrder {
                        parent_id,
                        order: first.order,
                        first: first.id,
                        second: second.id,
                    });
                }
            }
        }

        violations
    }

    // ============================================================
    // Maintenance
    // ============================================================

    /// Fold a committed plan into the index.
    ///
    /// Plans that only touch attached nodes and reparent at most one of them
    /// are applied in place, re-sorting only the affected sibling lists.
    /// Anything else triggers a full re-derivation. Patches for unknown ids
    /// are ignored.
    pub fn apply(&mut self, plan: &MovePlan) {
        let patches = plan.all_patches();
        let reparents = patches
            .iter()
            .filter(|p| self.parent_of(p.id) != p.parent_id)
            .count();
        let in_place = reparents <= 1
            && patches.iter().all(|p| {
                self.contains(p.id)
                    && !self.is_orphaned(p.id)
                    && p.parent_id.map_or(true, |parent_id| {
                        self.contains(parent_id) && !self.is_orphaned(parent_id)
                    })
                    && !self.would_create_cycle(p.id, p.parent_id)
            });

        let mut touched = HashSet::new();
        for patch in &patches {
            let Some(entry) = self.entries.get_mut(&patch.id) else {
                continue;
            };
            let old_parent = entry.node.parent_id;
            entry.node.parent_id = patch.parent_id;
            entry.node.order = patch.order;

            if in_place && old_parent != patch.parent_id {
                if let Some(list) = self.children.get_mut(&old_parent) {
                    list.retain(|id| *id != patch.id);
                }
                self.children
                    .entry(patch.parent_id)
                    .or_default()
                    .push(patch.id);
            }
            touched.insert(patch.parent_id);
        }

        if !in_place {
            self.derive();
            return;
        }
        let entries = &self.entries;
        for parent_id in touched {
            if let Some(list) = self.children.get_mut(&parent_id) {
                sort_siblings(list, entries);
            }
        }
    }

    /// The nodes held by the index, including discarded duplicates.
    pub fn into_nodes(self) -> Vec<Node> {
        let Self {
            mut entries,
            ids,
            discarded,
            ..
        } = self;
        ids.iter()
            .filter_map(|id| entries.remove(id))
            .map(|e| e.node)
            .chain(discarded)
            .collect()
    }
}

fn sort_siblings(list: &mut [NodeId], entries: &HashMap<NodeId, Entry>) {
    list.sort_by_key(|id| (entries[id].node.order, *id));
}
