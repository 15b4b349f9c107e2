//! Re-spacing of a crowded sibling list.

use super::keys::{AllocatorError, KeySpacing};
use crate::models::{NodeId, OrderKey};

/// Evenly spaced keys for `siblings`, in the order given.
///
/// The result covers every sibling, so it is one all-or-nothing batch; applying
/// a prefix of it can leave keys colliding with untouched siblings.
pub fn rebalance(
    siblings: &[NodeId],
    spacing: &KeySpacing,
) -> Result<Vec<(NodeId, OrderKey)>, AllocatorError> {
    siblings
        .iter()
        .enumerate()
        .map(|(i, id)| spacing.nth(i).map(|key| (*id, key)))
        .collect()
}
