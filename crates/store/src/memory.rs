//! In-memory collection for tests/dev.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value;

use merx_core::{Patch, VersionedEntity};

use crate::collection::{ArrayUpdate, Collection, Filter, StoreError, fields};

/// RwLock-protected map of documents, stored as raw JSON the way a document
/// store would hold them.
#[derive(Debug)]
pub struct InMemoryCollection<T> {
    docs: RwLock<HashMap<String, Value>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: VersionedEntity> InMemoryCollection<T> {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            _marker: PhantomData,
        }
    }

    fn encode(doc: &T) -> Result<Value, StoreError> {
        serde_json::to_value(doc).map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn decode(value: Value) -> Result<T, StoreError> {
        serde_json::from_value(value).map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn matches(doc: &Value, filter: &Filter) -> bool {
        match filter {
            Filter::All => true,
            Filter::Eq { field, value } => doc.get(field) == Some(value),
            Filter::Contains { field, value } => doc
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
            Filter::ModifiedSince(cutoff) => {
                timestamp(doc, fields::CREATED_AT).is_some_and(|t| t >= *cutoff)
                    || timestamp(doc, fields::LAST_MODIFIED_AT).is_some_and(|t| t >= *cutoff)
            }
        }
    }
}

fn timestamp(doc: &Value, field: &str) -> Option<DateTime<Utc>> {
    doc.get(field)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

impl<T: VersionedEntity> Default for InMemoryCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: VersionedEntity> Collection<T> for InMemoryCollection<T> {
    fn find_one(&self, id: &str) -> Result<Option<T>, StoreError> {
        let docs = self.docs.read().expect("collection lock poisoned");
        docs.get(id).cloned().map(Self::decode).transpose()
    }

    fn find(&self, filter: &Filter) -> Result<Vec<T>, StoreError> {
        let docs = self.docs.read().expect("collection lock poisoned");
        let mut hits: Vec<(String, Value)> = docs
            .iter()
            .filter(|(_, doc)| Self::matches(doc, filter))
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect();
        // Deterministic order for scans and tests.
        hits.sort_by(|(a, _), (b, _)| a.cmp(b));
        hits.into_iter().map(|(_, doc)| Self::decode(doc)).collect()
    }

    fn insert_one(&self, mut doc: T) -> Result<T, StoreError> {
        let now = Utc::now();
        doc.set_version(0);
        doc.set_created_at(now);
        doc.set_last_modified_at(now);

        let id = doc.id().to_string();
        let value = Self::encode(&doc)?;

        let mut docs = self.docs.write().expect("collection lock poisoned");
        if docs.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        docs.insert(id, value);
        Ok(doc)
    }

    fn update_one(&self, id: &str, expected_version: u64, patch: &Patch) -> Result<T, StoreError> {
        let mut docs = self.docs.write().expect("collection lock poisoned");
        let doc = docs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let stored = doc
            .get(fields::VERSION)
            .and_then(Value::as_u64)
            .ok_or_else(|| StoreError::Storage(format!("document {id} has no version field")))?;
        if stored != expected_version {
            return Err(StoreError::Conflict {
                id: id.to_string(),
                expected: expected_version,
                stored,
            });
        }

        patch.apply_to(doc);
        if let Value::Object(map) = doc {
            map.insert(fields::VERSION.into(), Value::from(stored + 1));
            map.insert(
                fields::LAST_MODIFIED_AT.into(),
                serde_json::to_value(Utc::now())
                    .map_err(|e| StoreError::Storage(e.to_string()))?,
            );
        }
        Self::decode(doc.clone())
    }

    fn update_many(&self, filter: &Filter, update: &ArrayUpdate) -> Result<usize, StoreError> {
        let mut docs = self.docs.write().expect("collection lock poisoned");
        let mut touched = 0;
        for doc in docs.values_mut() {
            if !Self::matches(doc, filter) {
                continue;
            }
            let field = match update {
                ArrayUpdate::PullAll { field, .. } | ArrayUpdate::PushFront { field, .. } => field,
            };
            let Some(items) = doc.get_mut(field).and_then(Value::as_array_mut) else {
                continue;
            };
            match update {
                ArrayUpdate::PullAll { values, .. } => {
                    items.retain(|item| !values.contains(item));
                }
                ArrayUpdate::PushFront { values, .. } => {
                    items.splice(0..0, values.iter().cloned());
                }
            }
            touched += 1;
        }
        Ok(touched)
    }

    fn delete_one(&self, id: &str) -> Result<bool, StoreError> {
        let mut docs = self.docs.write().expect("collection lock poisoned");
        Ok(docs.remove(id).is_some())
    }
}
