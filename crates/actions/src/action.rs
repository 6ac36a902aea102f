//! Closed sum type over the supported mutation kinds.
//!
//! Dispatch is by tagged variant through a static table rather than by
//! runtime string key, so an unhandled kind is a compile-time hole, not a
//! silent miss.

use serde::{Deserialize, Serialize};

/// A named, typed mutation request applied to an entity by a matching handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Action {
    SetKey { key: Option<String> },
    ChangeName { name: String },
    ChangeDescription { description: Option<String> },
    ChangeKeywords { keywords: Vec<String> },
    ChangeParent { parent: Option<String> },
}

/// Discriminant of [`Action`], used as the handler-table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    SetKey,
    ChangeName,
    ChangeDescription,
    ChangeKeywords,
    ChangeParent,
}

impl ActionKind {
    pub const COUNT: usize = 5;

    pub fn index(self) -> usize {
        match self {
            ActionKind::SetKey => 0,
            ActionKind::ChangeName => 1,
            ActionKind::ChangeDescription => 2,
            ActionKind::ChangeKeywords => 3,
            ActionKind::ChangeParent => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::SetKey => "setKey",
            ActionKind::ChangeName => "changeName",
            ActionKind::ChangeDescription => "changeDescription",
            ActionKind::ChangeKeywords => "changeKeywords",
            ActionKind::ChangeParent => "changeParent",
        }
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::SetKey { .. } => ActionKind::SetKey,
            Action::ChangeName { .. } => ActionKind::ChangeName,
            Action::ChangeDescription { .. } => ActionKind::ChangeDescription,
            Action::ChangeKeywords { .. } => ActionKind::ChangeKeywords,
            Action::ChangeParent { .. } => ActionKind::ChangeParent,
        }
    }
}
