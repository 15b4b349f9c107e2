//! Domain models for the backlog ordering engine.
//!
//! # Core Concepts
//!
//! - [`Node`]: One work item. Hierarchy is a `parent_id` back-reference plus an
//!   [`OrderKey`] among siblings; nothing owns its children.
//! - [`WorkItemType`]: The closed set of item kinds (Epic, Feature, Story, Task).
//! - [`OrderKey`]: Fixed-point sibling position that can be subdivided until the
//!   gap runs out, at which point siblings are rebalanced.
//!
//! ## Moves
//!
//! - [`Gesture`]: What the UI reports when a drag ends over a target.
//! - [`DropIntent`]: Before, After or Inside, as resolved from the gesture.
//! - [`MovePlan`]: The atomic set of [`Patch`]es that realises one move.

mod node;
mod order_key;
mod plan;

pub use node::*;
pub use order_key::*;
pub use plan::*;
