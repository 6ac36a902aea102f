//! Shared fixtures for runner/service tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use merx_core::{Keyed, Named, Tagged, VersionedEntity};
use merx_store::InMemoryCollection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestEntity {
    pub id: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    pub key: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
}

impl TestEntity {
    pub fn new(id: &str, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            version: 0,
            created_at: now,
            last_modified_at: now,
            key: None,
            name: name.into(),
            description: None,
            keywords: Vec::new(),
        }
    }
}

impl VersionedEntity for TestEntity {
    const KIND: &'static str = "test-entity";

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

impl Keyed for TestEntity {
    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
    fn set_key(&mut self, key: Option<String>) {
        self.key = key;
    }
}

impl Named for TestEntity {
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

impl Tagged for TestEntity {
    fn keywords(&self) -> &[String] {
        &self.keywords
    }
    fn set_keywords(&mut self, keywords: Vec<String>) {
        self.keywords = keywords;
    }
}

pub fn test_collection() -> InMemoryCollection<TestEntity> {
    InMemoryCollection::new()
}
