//! `merx-categories`: hierarchical category tree.
//!
//! Ancestor-list consistency under re-parenting has a synchronous half (the
//! `changeParent` handler) and an asynchronous half (the repair listener that
//! fixes descendant ancestor lists after the re-parenting write committed).

pub mod category;
pub mod repair;
pub mod reparent;

pub use category::{Category, handler_table};
pub use repair::{RepairDescendants, repair_descendants, spawn_repair_listener};
pub use reparent::{ChangeParentHandler, REPAIR_DESCENDANTS};
