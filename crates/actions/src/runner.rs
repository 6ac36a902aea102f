//! Generic action orchestrator.

use merx_core::{DomainError, DomainResult, Patch, VersionedEntity};
use merx_store::Collection;

use crate::action::Action;
use crate::handler::{HandlerTable, SideEffect};

/// Accumulated result of running one or more actions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    /// Shallow-merged persistence patch across all actions.
    pub patch: Patch,
    /// Side effects in arrival order, not deduplicated.
    pub side_effects: Vec<SideEffect>,
}

/// Applies a sequence of actions to a working clone.
///
/// The first handler error aborts the remaining sequence; earlier in-memory
/// mutations to the clone persist, so callers must discard the clone on
/// error.
pub struct ActionRunner<E: VersionedEntity> {
    table: HandlerTable<E>,
}

impl<E: VersionedEntity> ActionRunner<E> {
    pub fn new(table: HandlerTable<E>) -> Self {
        Self { table }
    }

    pub fn run(
        &self,
        current: &E,
        working: &mut E,
        actions: &[Action],
        repo: &dyn Collection<E>,
    ) -> DomainResult<UpdateOutcome> {
        let mut outcome = UpdateOutcome::default();
        for action in actions {
            let kind = action.kind();
            let handler = self.table.get(kind).ok_or_else(|| {
                DomainError::validation(format!(
                    "action '{}' is not supported for {}",
                    kind.as_str(),
                    E::KIND
                ))
            })?;
            let step = handler.run(current, working, action, repo)?;
            outcome.patch.merge(step.patch);
            outcome.side_effects.extend(step.side_effects);
        }
        Ok(outcome)
    }
}
