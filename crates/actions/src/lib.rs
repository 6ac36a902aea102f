//! `merx-actions`: the uniform mutation protocol.
//!
//! Every mutable entity is updated through the same pipeline: load at an
//! expected version, clone, run a sequence of actions through per-kind
//! handlers, persist the merged patch conditionally, publish a change event
//! and any handler side effects.

pub mod action;
pub mod handler;
pub mod runner;
pub mod service;

#[cfg(test)]
mod test_support;

pub use action::{Action, ActionKind};
pub use handler::{
    ActionHandler, ChangeDescriptionHandler, ChangeKeywordsHandler, ChangeNameHandler,
    HandlerOutcome, HandlerTable, SetKeyHandler, SideEffect,
};
pub use runner::{ActionRunner, UpdateOutcome};
pub use service::{EntityService, RequestContext};
