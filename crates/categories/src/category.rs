//! Category tree node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use merx_actions::{
    ChangeDescriptionHandler, ChangeKeywordsHandler, ChangeNameHandler, HandlerTable,
    SetKeyHandler,
};
use merx_core::{Keyed, Named, Tagged, TreeNode, VersionedEntity};

use crate::reparent::ChangeParentHandler;

/// A node of the category tree.
///
/// `ancestors` is ordered root-first (`ancestors(parent) + [parent]`); it is
/// kept consistent eventually, via the repair listener, not instantaneously.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    pub key: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    /// Empty means root.
    pub parent: Option<String>,
    pub ancestors: Vec<String>,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
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
            parent: None,
            ancestors: Vec::new(),
        }
    }

    /// Place the node under `parent`, given the parent's own ancestor chain.
    pub fn under(mut self, parent: impl Into<String>, parent_ancestors: &[String]) -> Self {
        let parent = parent.into();
        let mut ancestors = parent_ancestors.to_vec();
        ancestors.push(parent.clone());
        self.parent = Some(parent);
        self.ancestors = ancestors;
        self
    }
}

impl VersionedEntity for Category {
    const KIND: &'static str = "category";

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

impl Keyed for Category {
    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
    fn set_key(&mut self, key: Option<String>) {
        self.key = key;
    }
}

impl Named for Category {
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

impl Tagged for Category {
    fn keywords(&self) -> &[String] {
        &self.keywords
    }
    fn set_keywords(&mut self, keywords: Vec<String>) {
        self.keywords = keywords;
    }
}

impl TreeNode for Category {
    fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }
    fn set_parent(&mut self, parent: Option<String>) {
        self.parent = parent;
    }
    fn ancestors(&self) -> &[String] {
        &self.ancestors
    }
    fn set_ancestors(&mut self, ancestors: Vec<String>) {
        self.ancestors = ancestors;
    }
}

/// Categories support all five action kinds.
pub fn handler_table() -> HandlerTable<Category> {
    HandlerTable::new()
        .register(Box::new(SetKeyHandler))
        .register(Box::new(ChangeNameHandler))
        .register(Box::new(ChangeDescriptionHandler))
        .register(Box::new(ChangeKeywordsHandler))
        .register(Box::new(ChangeParentHandler))
}
