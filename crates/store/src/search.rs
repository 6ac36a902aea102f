//! Full-text search index collaborator (abstract upsert/update sink).

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

use crate::collection::{StoreError, fields};

/// Abstract search index fed from change events. Consumed by listeners; the
/// index itself lives outside this core.
pub trait SearchIndex: Send + Sync {
    /// Insert or replace a document; the document must carry an `id` field.
    fn upsert(&self, doc: Value) -> Result<(), StoreError>;

    /// Merge a partial document into an existing entry.
    fn update(&self, partial: Value) -> Result<(), StoreError>;
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct InMemorySearchIndex {
    docs: RwLock<HashMap<String, Value>>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Value> {
        self.docs.read().expect("index lock poisoned").get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.docs.read().expect("index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn doc_id(doc: &Value) -> Result<String, StoreError> {
    doc.get(fields::ID)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::Storage("search document without id".into()))
}

impl SearchIndex for InMemorySearchIndex {
    fn upsert(&self, doc: Value) -> Result<(), StoreError> {
        let id = doc_id(&doc)?;
        self.docs.write().expect("index lock poisoned").insert(id, doc);
        Ok(())
    }

    fn update(&self, partial: Value) -> Result<(), StoreError> {
        let id = doc_id(&partial)?;
        let mut docs = self.docs.write().expect("index lock poisoned");
        let existing = docs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if let (Value::Object(dst), Value::Object(src)) = (existing, partial) {
            for (key, value) in src {
                dst.insert(key, value);
            }
        }
        Ok(())
    }
}
