//! Change events published once per successful mutation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use merx_core::{DiffEntry, DomainError, DomainResult, ProjectId, RequestId};

/// Whether the mutation created or updated the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Insert,
    Update,
}

/// Request-scoped metadata carried on every change event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub project_id: ProjectId,
    pub request_id: RequestId,
    pub catalog_id: Option<String>,
    pub change_type: ChangeType,
}

/// Published once per successful mutation; consumed by audit logging, search
/// indexing and the cart-price indexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity_kind: String,
    /// Snapshot of the entity after the write.
    pub snapshot: Value,
    /// Structural before/after difference; empty for inserts.
    pub diff: Vec<DiffEntry>,
    pub metadata: EventMetadata,
}

impl ChangeEvent {
    /// Topic a given entity kind's change events are published on.
    pub fn topic(entity_kind: &str) -> String {
        format!("{entity_kind}.changed")
    }

    pub fn to_value(&self) -> DomainResult<Value> {
        serde_json::to_value(self)
            .map_err(|e| DomainError::internal(format!("change event serialization: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_through_json() {
        let event = ChangeEvent {
            entity_kind: "product".into(),
            snapshot: json!({"id": "p1", "name": "B"}),
            diff: vec![],
            metadata: EventMetadata {
                project_id: ProjectId::new("demo"),
                request_id: RequestId::new(),
                catalog_id: Some("staged".into()),
                change_type: ChangeType::Update,
            },
        };

        let value = event.to_value().unwrap();
        let back: ChangeEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn topic_is_kind_scoped() {
        assert_eq!(ChangeEvent::topic("category"), "category.changed");
    }
}
