//! Caller-level mutation protocol, used identically by every entity service.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use merx_core::{DomainError, DomainResult, ExpectedVersion, ProjectId, RequestId, VersionedEntity, diff};
use merx_events::{ChangeEvent, ChangeType, EventMetadata, PubSub};
use merx_store::Collection;

use crate::action::Action;
use crate::handler::HandlerTable;
use crate::runner::ActionRunner;

/// Request-scoped identifiers carried into change-event metadata.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub project_id: ProjectId,
    pub request_id: RequestId,
    pub catalog_id: Option<String>,
}

impl RequestContext {
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            request_id: RequestId::new(),
            catalog_id: None,
        }
    }

    pub fn with_catalog(mut self, catalog_id: impl Into<String>) -> Self {
        self.catalog_id = Some(catalog_id.into());
        self
    }
}

/// Entity mutation surface: `apply_actions(id, expected_version, actions)`.
///
/// Correctness under concurrent writers relies on the store's per-document
/// conditional write, not on in-process locking: of two racers on the same
/// `(id, version)`, exactly one write succeeds and the other observes
/// `Conflict`, never a silent retry, since the loser's base state is stale.
pub struct EntityService<E: VersionedEntity> {
    collection: Arc<dyn Collection<E>>,
    bus: Arc<dyn PubSub>,
    runner: ActionRunner<E>,
}

impl<E: VersionedEntity> EntityService<E> {
    pub fn new(
        collection: Arc<dyn Collection<E>>,
        bus: Arc<dyn PubSub>,
        table: HandlerTable<E>,
    ) -> Self {
        Self {
            collection,
            bus,
            runner: ActionRunner::new(table),
        }
    }

    pub fn collection(&self) -> &dyn Collection<E> {
        self.collection.as_ref()
    }

    /// Insert a new entity (version 0, timestamps system-assigned) and publish
    /// an insert change event.
    pub fn create(&self, entity: E, ctx: &RequestContext) -> DomainResult<E> {
        let stored = self.collection.insert_one(entity)?;
        let snapshot = to_snapshot(&stored)?;
        self.publish_change(snapshot, Vec::new(), ChangeType::Insert, ctx);
        Ok(stored)
    }

    /// Apply a sequence of actions at an expected version.
    ///
    /// An empty structural difference means the mutation was a true no-op:
    /// no write is issued and no event published, even for chained no-op
    /// actions.
    pub fn apply_actions(
        &self,
        id: &str,
        expected_version: u64,
        actions: &[Action],
        ctx: &RequestContext,
    ) -> DomainResult<E> {
        let current = self.collection.find_one(id)?.ok_or(DomainError::NotFound)?;
        ExpectedVersion::Exact(expected_version).check(current.version())?;

        let mut working = current.clone();
        let outcome = self
            .runner
            .run(&current, &mut working, actions, self.collection.as_ref())?;

        let difference = diff(&to_snapshot(&current)?, &to_snapshot(&working)?);
        if difference.is_empty() {
            debug!(entity = E::KIND, id, "no-op mutation; skipping write");
            return Ok(current);
        }

        let updated = self
            .collection
            .update_one(id, expected_version, &outcome.patch)?;

        let snapshot = to_snapshot(&updated)?;
        self.publish_change(snapshot, difference, ChangeType::Update, ctx);

        // Publication after the conditional write is fire-and-forget; a crash
        // in between is an accepted gap covered by periodic reconciliation.
        for effect in outcome.side_effects {
            if let Err(e) = self.bus.publish(&effect.target, effect.data) {
                warn!(
                    entity = E::KIND,
                    id,
                    target = %effect.target,
                    error = %e,
                    "side effect publication failed"
                );
            }
        }

        Ok(updated)
    }

    fn publish_change(
        &self,
        snapshot: Value,
        difference: Vec<merx_core::DiffEntry>,
        change_type: ChangeType,
        ctx: &RequestContext,
    ) {
        let event = ChangeEvent {
            entity_kind: E::KIND.to_string(),
            snapshot,
            diff: difference,
            metadata: EventMetadata {
                project_id: ctx.project_id.clone(),
                request_id: ctx.request_id,
                catalog_id: ctx.catalog_id.clone(),
                change_type,
            },
        };
        let topic = ChangeEvent::topic(E::KIND);
        match event.to_value() {
            Ok(payload) => {
                if let Err(e) = self.bus.publish(&topic, payload) {
                    warn!(topic = %topic, error = %e, "change event publication failed");
                }
            }
            Err(e) => warn!(topic = %topic, error = %e, "change event serialization failed"),
        }
    }
}

fn to_snapshot<E: VersionedEntity>(entity: &E) -> DomainResult<Value> {
    serde_json::to_value(entity)
        .map_err(|e| DomainError::internal(format!("{} serialization: {e}", E::KIND)))
}
