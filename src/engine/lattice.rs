//! Parent/child containment rules between work-item types.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::WorkItemType;

/// Host-facing form of the lattice: `{ "epic": ["feature", "story"], ... }`.
pub type LatticeTable = BTreeMap<WorkItemType, Vec<WorkItemType>>;

/// Which types may be the immediate children of which.
///
/// Every type in [`WorkItemType::ALL`] always has an entry. A host table only
/// overrides the types it names; the rest keep their built-in children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LatticeTable", into = "LatticeTable")]
pub struct TypeLattice {
    children: BTreeMap<WorkItemType, BTreeSet<WorkItemType>>,
}

impl Default for TypeLattice {
    fn default() -> Self {
        let children = WorkItemType::ALL
            .into_iter()
            .map(|t| (t, t.default_children().iter().copied().collect()))
            .collect();
        Self { children }
    }
}

impl TypeLattice {
    /// Legal immediate child types of `parent`.
    pub fn child_types_of(&self, parent: WorkItemType) -> &BTreeSet<WorkItemType> {
        &self.children[&parent]
    }

    pub fn can_parent(&self, parent: WorkItemType, child: WorkItemType) -> bool {
        self.child_types_of(parent).contains(&child)
    }

    /// Root legality is fixed: only epics live at the top level.
    pub fn can_be_root(&self, kind: WorkItemType) -> bool {
        kind.can_be_root()
    }

    /// Legality of placing `child` under `parent`, where `None` is the top level.
    pub fn can_place(&self, parent: Option<WorkItemType>, child: WorkItemType) -> bool {
        match parent {
            Some(parent) => self.can_parent(parent, child),
            None => self.can_be_root(child),
        }
    }

    /// Replace the children allowed under `parent`.
    pub fn with_children(
        mut self,
        parent: WorkItemType,
        children: impl IntoIterator<Item = WorkItemType>,
    ) -> Self {
        self.children.insert(parent, children.into_iter().collect());
        self
    }

    /// Additionally allow `child` under `parent`.
    pub fn allow(mut self, parent: WorkItemType, child: WorkItemType) -> Self {
        self.children.entry(parent).or_default().insert(child);
        self
    }
}

impl From<LatticeTable> for TypeLattice {
    fn from(table: LatticeTable) -> Self {
        table
            .into_iter()
            .fold(Self::default(), |lattice, (parent, children)| {
                lattice.with_children(parent, children)
            })
    }
}

impl From<TypeLattice> for LatticeTable {
    fn from(lattice: TypeLattice) -> Self {
        lattice
            .children
            .into_iter()
            .map(|(parent, children)| (parent, children.into_iter().collect()))
            .collect()
    }
}
