//! Synchronous half of the tree manager: the `changeParent` handler.

use serde_json::json;

use merx_actions::{Action, ActionHandler, ActionKind, HandlerOutcome, SideEffect};
use merx_core::{DomainError, DomainResult, Patch, TreeNode};
use merx_store::Collection;

use crate::repair::RepairDescendants;

/// Routing key of the descendant-repair side effect.
pub const REPAIR_DESCENDANTS: &str = "repair-descendants";

/// Moves a node under a new parent and schedules descendant repair.
pub struct ChangeParentHandler;

impl<E: TreeNode> ActionHandler<E> for ChangeParentHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::ChangeParent
    }

    fn run(
        &self,
        current: &E,
        working: &mut E,
        action: &Action,
        repo: &dyn Collection<E>,
    ) -> DomainResult<HandlerOutcome> {
        let Action::ChangeParent { parent } = action else {
            return Err(DomainError::internal(
                "handler for changeParent received a mismatched action",
            ));
        };

        // Idempotent no-op against the loaded entity, not the working clone.
        if current.parent() == parent.as_deref() {
            return Ok(HandlerOutcome::empty());
        }
        if parent.as_deref() == Some(current.id()) {
            return Err(DomainError::validation("parent: node cannot be its own parent"));
        }

        let new_ancestors = match parent {
            None => Vec::new(),
            Some(parent_id) => {
                let target = repo.find_one(parent_id)?.ok_or(DomainError::NotFound)?;
                let mut chain = target.ancestors().to_vec();
                chain.push(parent_id.clone());
                chain
            }
        };

        let old_ancestors = current.ancestors().to_vec();
        working.set_parent(parent.clone());
        working.set_ancestors(new_ancestors.clone());

        let patch = Patch::new()
            .set("parent", json!(parent))
            .set("ancestors", json!(new_ancestors));
        let effect = SideEffect::new(
            REPAIR_DESCENDANTS,
            json!(RepairDescendants {
                id: current.id().to_string(),
                old_ancestors,
            }),
        );

        Ok(HandlerOutcome {
            patch,
            side_effects: vec![effect],
        })
    }
}
