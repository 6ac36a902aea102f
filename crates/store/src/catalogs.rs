//! Catalog registry: one product collection per staged/published catalog.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use merx_core::VersionedEntity;

use crate::collection::{Collection, StoreError};
use crate::memory::InMemoryCollection;

/// Resolves a catalog id to its document collection.
pub trait Catalogs<T: VersionedEntity>: Send + Sync {
    fn collection(&self, catalog: &str) -> Result<Arc<dyn Collection<T>>, StoreError>;
}

/// In-memory registry that creates catalogs on first use.
pub struct InMemoryCatalogs<T> {
    inner: RwLock<HashMap<String, Arc<InMemoryCollection<T>>>>,
}

impl<T: VersionedEntity> InMemoryCatalogs<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Typed accessor used by tests to seed and inspect a catalog directly.
    pub fn open(&self, catalog: &str) -> Arc<InMemoryCollection<T>> {
        let mut inner = self.inner.write().expect("catalog registry poisoned");
        inner
            .entry(catalog.to_string())
            .or_insert_with(|| Arc::new(InMemoryCollection::new()))
            .clone()
    }
}

impl<T: VersionedEntity> Default for InMemoryCatalogs<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: VersionedEntity> Catalogs<T> for InMemoryCatalogs<T> {
    fn collection(&self, catalog: &str) -> Result<Arc<dyn Collection<T>>, StoreError> {
        Ok(self.open(catalog))
    }
}
