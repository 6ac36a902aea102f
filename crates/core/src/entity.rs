//! Versioned-entity contract and the field capability seams handlers work through.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{DomainError, DomainResult};

/// Any persisted business object.
///
/// - `id` is stable and externally visible.
/// - `version` starts at 0 and is incremented exactly once per successful
///   update; a write succeeds only if the stored version equals the version
///   supplied by the caller.
/// - `created_at`/`last_modified_at` are system-assigned by the store.
pub trait VersionedEntity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Stable entity kind identifier (e.g. "product", "category").
    const KIND: &'static str;

    fn id(&self) -> &str;

    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);

    fn created_at(&self) -> DateTime<Utc>;
    fn set_created_at(&mut self, at: DateTime<Utc>);

    fn last_modified_at(&self) -> DateTime<Utc>;
    fn set_last_modified_at(&mut self, at: DateTime<Utc>);
}

/// Optimistic concurrency expectation for a conditional write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (migrations, idempotent repairs).
    Any,
    /// Require the entity to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "version mismatch (expected: {self:?}, stored: {actual})"
            )))
        }
    }
}

/// Entities carrying an optional user-defined key.
pub trait Keyed {
    fn key(&self) -> Option<&str>;
    fn set_key(&mut self, key: Option<String>);
}

/// Entities with a display name and optional description.
pub trait Named {
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);

    fn description(&self) -> Option<&str>;
    fn set_description(&mut self, description: Option<String>);
}

/// Entities carrying search keywords.
pub trait Tagged {
    fn keywords(&self) -> &[String];
    fn set_keywords(&mut self, keywords: Vec<String>);
}

/// Hierarchical entities (categories).
///
/// `ancestors` is ordered root-first: `ancestors(node) = ancestors(parent) +
/// [parent]`, empty for roots. The invariant is eventually consistent;
/// descendant repair after a re-parent happens asynchronously.
pub trait TreeNode: VersionedEntity {
    fn parent(&self) -> Option<&str>;
    fn set_parent(&mut self, parent: Option<String>);

    fn ancestors(&self) -> &[String];
    fn set_ancestors(&mut self, ancestors: Vec<String>);
}

/// Entities owned by a staged or published catalog.
pub trait CatalogScoped {
    fn catalog(&self) -> &str;
    fn set_catalog(&mut self, catalog: String);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_version_check() {
        assert!(ExpectedVersion::Exact(3).check(3).is_ok());
        let err = ExpectedVersion::Exact(3).check(4).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn any_version_matches_everything() {
        assert!(ExpectedVersion::Any.check(0).is_ok());
        assert!(ExpectedVersion::Any.check(17).is_ok());
    }
}
