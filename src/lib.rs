//! Ordering engine for typed Epic/Feature/Story/Task backlogs.
//!
//! The engine turns a drag gesture over a flat snapshot of work items into a
//! [`models::MovePlan`]: a batch of `(id, parent_id, order)` patches that the
//! host applies atomically. Nothing in [`engine`] performs I/O.
//!
//! - [`engine`]: type lattice, key allocation, rebalancing, tree index, drop
//!   resolution and move planning
//! - [`store`]: the host-facing persistence boundary and an in-memory store
//! - [`commit`]: snapshot, plan and apply in one call
//! - [`config`]: tunables loaded from the user's config directory

pub mod commit;
pub mod config;
pub mod engine;
pub mod models;
pub mod store;
pub mod tree_render;
