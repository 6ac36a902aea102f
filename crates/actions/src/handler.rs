//! Action handlers: small, stateless strategies, one per mutation kind.
//!
//! A handler mutates the working clone for the fields it owns and returns the
//! minimal persistence patch for those fields. If the requested value equals
//! the current one it returns an empty patch, so true no-ops produce neither
//! a write nor a change event.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use merx_core::{DomainError, DomainResult, Keyed, Named, Patch, Tagged, VersionedEntity};
use merx_store::Collection;

use crate::action::{Action, ActionKind};

/// Secondary, asynchronous instruction emitted by a handler, delivered via
/// pub/sub using `target` as the routing key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideEffect {
    pub target: String,
    pub data: Value,
}

impl SideEffect {
    pub fn new(target: impl Into<String>, data: Value) -> Self {
        Self {
            target: target.into(),
            data,
        }
    }
}

/// Result of one handler invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerOutcome {
    pub patch: Patch,
    pub side_effects: Vec<SideEffect>,
}

impl HandlerOutcome {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_patch(patch: Patch) -> Self {
        Self {
            patch,
            side_effects: Vec::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.patch.is_empty() && self.side_effects.is_empty()
    }
}

/// Strategy for one action kind.
///
/// `current` is the entity as loaded, `working` the clone being mutated;
/// `repo` gives read access for handlers that must look up siblings (the
/// re-parent handler fetches the target parent through it).
pub trait ActionHandler<E: VersionedEntity>: Send + Sync {
    fn kind(&self) -> ActionKind;

    fn run(
        &self,
        current: &E,
        working: &mut E,
        action: &Action,
        repo: &dyn Collection<E>,
    ) -> DomainResult<HandlerOutcome>;
}

/// Static lookup table from action kind to handler.
///
/// Each entity type registers the kinds it supports; an action of an
/// unregistered kind fails with `Validation` before touching the clone.
pub struct HandlerTable<E: VersionedEntity> {
    slots: [Option<Box<dyn ActionHandler<E>>>; ActionKind::COUNT],
}

impl<E: VersionedEntity> HandlerTable<E> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    pub fn register(mut self, handler: Box<dyn ActionHandler<E>>) -> Self {
        let index = handler.kind().index();
        self.slots[index] = Some(handler);
        self
    }

    pub fn get(&self, kind: ActionKind) -> Option<&dyn ActionHandler<E>> {
        self.slots[kind.index()].as_deref()
    }
}

impl<E: VersionedEntity> Default for HandlerTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn mismatched(kind: ActionKind) -> DomainError {
    DomainError::internal(format!("handler for {} received a mismatched action", kind.as_str()))
}

/// `setKey` for any [`Keyed`] entity.
pub struct SetKeyHandler;

impl<E: VersionedEntity + Keyed> ActionHandler<E> for SetKeyHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::SetKey
    }

    fn run(
        &self,
        _current: &E,
        working: &mut E,
        action: &Action,
        _repo: &dyn Collection<E>,
    ) -> DomainResult<HandlerOutcome> {
        let Action::SetKey { key } = action else {
            return Err(mismatched(ActionKind::SetKey));
        };
        if let Some(key) = key {
            if key.is_empty() {
                return Err(DomainError::validation("key: must not be empty"));
            }
        }
        if working.key() == key.as_deref() {
            return Ok(HandlerOutcome::empty());
        }
        working.set_key(key.clone());
        Ok(HandlerOutcome::with_patch(Patch::new().set("key", json!(key))))
    }
}

/// `changeName` for any [`Named`] entity.
pub struct ChangeNameHandler;

impl<E: VersionedEntity + Named> ActionHandler<E> for ChangeNameHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::ChangeName
    }

    fn run(
        &self,
        _current: &E,
        working: &mut E,
        action: &Action,
        _repo: &dyn Collection<E>,
    ) -> DomainResult<HandlerOutcome> {
        let Action::ChangeName { name } = action else {
            return Err(mismatched(ActionKind::ChangeName));
        };
        if name.is_empty() {
            return Err(DomainError::validation("name: must not be empty"));
        }
        if working.name() == name {
            return Ok(HandlerOutcome::empty());
        }
        working.set_name(name.clone());
        Ok(HandlerOutcome::with_patch(Patch::new().set("name", json!(name))))
    }
}

/// `changeDescription` for any [`Named`] entity.
pub struct ChangeDescriptionHandler;

impl<E: VersionedEntity + Named> ActionHandler<E> for ChangeDescriptionHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::ChangeDescription
    }

    fn run(
        &self,
        _current: &E,
        working: &mut E,
        action: &Action,
        _repo: &dyn Collection<E>,
    ) -> DomainResult<HandlerOutcome> {
        let Action::ChangeDescription { description } = action else {
            return Err(mismatched(ActionKind::ChangeDescription));
        };
        if working.description() == description.as_deref() {
            return Ok(HandlerOutcome::empty());
        }
        working.set_description(description.clone());
        Ok(HandlerOutcome::with_patch(
            Patch::new().set("description", json!(description)),
        ))
    }
}

/// `changeKeywords` for any [`Tagged`] entity.
pub struct ChangeKeywordsHandler;

impl<E: VersionedEntity + Tagged> ActionHandler<E> for ChangeKeywordsHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::ChangeKeywords
    }

    fn run(
        &self,
        _current: &E,
        working: &mut E,
        action: &Action,
        _repo: &dyn Collection<E>,
    ) -> DomainResult<HandlerOutcome> {
        let Action::ChangeKeywords { keywords } = action else {
            return Err(mismatched(ActionKind::ChangeKeywords));
        };
        if working.keywords() == keywords.as_slice() {
            return Ok(HandlerOutcome::empty());
        }
        working.set_keywords(keywords.clone());
        Ok(HandlerOutcome::with_patch(
            Patch::new().set("keywords", json!(keywords)),
        ))
    }
}
