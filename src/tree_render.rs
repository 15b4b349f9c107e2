//! ASCII tree rendering for work-item hierarchies.

use std::collections::HashSet;

use crate::engine::{Anomaly, TreeIndex};
use crate::models::{NodeId, WorkItemType};

const EPIC: char = '◆';
const FEATURE: char = '■';
const STORY: char = '●';
const TASK: char = '·';

/// Get the symbol for a work-item type.
fn type_symbol(kind: WorkItemType) -> char {
    match kind {
        WorkItemType::Epic => EPIC,
        WorkItemType::Feature => FEATURE,
        WorkItemType::Story => STORY,
        WorkItemType::Task => TASK,
    }
}

/// Render the forest held by `tree` as ASCII art with type symbols.
///
/// Orphaned nodes are listed after the forest, each as the root of its own
/// detached subtree.
///
/// Example output:
/// ```text
/// Billing
/// ├── ■ Invoicing
/// │   ├── ● Send invoice
/// │   │   └── · Email template
/// │   └── ● Reminders
/// └── ● Refunds
/// ```
pub fn render_tree(tree: &TreeIndex) -> String {
    let mut output = String::new();
    let mut seen = HashSet::new();
    render_list(&mut output, &mut seen, tree, tree.roots());

    // Heads of detached subtrees: below a missing parent, or the first member
    // of a cycle. Their descendants render below them.
    let mut detached: Vec<NodeId> = tree
        .orphans()
        .into_iter()
        .filter(|id| {
            tree.parent_of(*id)
                .is_some_and(|parent_id| !tree.contains(parent_id))
        })
        .collect();
    detached.extend(tree.anomalies().iter().filter_map(|a| match a {
        Anomaly::Cycle { members } => members.first().copied(),
        _ => None,
    }));
    if !detached.is_empty() {
        output.push_str("(orphaned)\n");
        render_list(&mut output, &mut seen, tree, &detached);
    }
    output
}

fn render_list(
    output: &mut String,
    seen: &mut HashSet<NodeId>,
    tree: &TreeIndex,
    roots: &[NodeId],
) {
    for (i, id) in roots.iter().enumerate() {
        let is_last = i == roots.len() - 1;
        render_node(output, seen, tree, *id, "", is_last, true);
    }
}

/// Recursively render a node and its children.
fn render_node(
    output: &mut String,
    seen: &mut HashSet<NodeId>,
    tree: &TreeIndex,
    id: NodeId,
    prefix: &str,
    is_last: bool,
    is_root: bool,
) {
    // Cycle members point back at an ancestor; stop instead of looping.
    if !seen.insert(id) {
        return;
    }
    let Some(node) = tree.get(id) else {
        return;
    };

    if is_root {
        // Root nodes: just title (no branch characters)
        output.push_str(&node.title);
        output.push('\n');
    } else {
        let branch = if is_last { "└── " } else { "├── " };
        output.push_str(prefix);
        output.push_str(branch);
        output.push(type_symbol(node.kind));
        output.push(' ');
        output.push_str(&node.title);
        output.push('\n');
    }

    let child_prefix = if is_root {
        String::new()
    } else {
        let continuation = if is_last { "    " } else { "│   " };
        format!("{}{}", prefix, continuation)
    };

    let children = tree.children_of(Some(id));
    for (i, child) in children.iter().enumerate() {
        let child_is_last = i == children.len() - 1;
        render_node(output, seen, tree, *child, &child_prefix, child_is_last, false);
    }
}
