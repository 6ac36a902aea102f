//! Product document: the staged/published entity the sync engine reconciles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use merx_actions::{
    ChangeDescriptionHandler, ChangeKeywordsHandler, ChangeNameHandler, HandlerTable,
    SetKeyHandler,
};
use merx_core::{CatalogScoped, Keyed, Named, Tagged, VersionedEntity};

/// One product document inside one catalog.
///
/// Options serialize as explicit nulls so conditional-update patches can
/// unset them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    /// Owning catalog id (staged or published working set).
    pub catalog: String,
    pub key: Option<String>,
    pub sku: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
}

impl Product {
    pub fn new(id: impl Into<String>, catalog: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            version: 0,
            created_at: now,
            last_modified_at: now,
            catalog: catalog.into(),
            key: None,
            sku: None,
            name: name.into(),
            description: None,
            keywords: Vec::new(),
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

impl VersionedEntity for Product {
    const KIND: &'static str = "product";

    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
    }
    fn last_modified_at(&self) -> DateTime<Utc> {
        self.last_modified_at
    }
    fn set_last_modified_at(&mut self, at: DateTime<Utc>) {
        self.last_modified_at = at;
    }
}

impl Keyed for Product {
    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
    fn set_key(&mut self, key: Option<String>) {
        self.key = key;
    }
}

impl Named for Product {
    fn name(&self) -> &str {
        &self.name
    }
    fn set_name(&mut self, name: String) {
        self.name = name;
    }
    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
    fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }
}

impl Tagged for Product {
    fn keywords(&self) -> &[String] {
        &self.keywords
    }
    fn set_keywords(&mut self, keywords: Vec<String>) {
        self.keywords = keywords;
    }
}

impl CatalogScoped for Product {
    fn catalog(&self) -> &str {
        &self.catalog
    }
    fn set_catalog(&mut self, catalog: String) {
        self.catalog = catalog;
    }
}

/// Products support every action kind except re-parenting.
pub fn handler_table() -> HandlerTable<Product> {
    HandlerTable::new()
        .register(Box::new(SetKeyHandler))
        .register(Box::new(ChangeNameHandler))
        .register(Box::new(ChangeDescriptionHandler))
        .register(Box::new(ChangeKeywordsHandler))
}
