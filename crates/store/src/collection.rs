//! Abstract document collection keyed by id and a numeric version field.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use merx_core::{DomainError, Patch, VersionedEntity};

/// Bookkeeping field names shared by every collection.
pub mod fields {
    pub const ID: &str = "id";
    pub const VERSION: &str = "version";
    pub const CREATED_AT: &str = "created_at";
    pub const LAST_MODIFIED_AT: &str = "last_modified_at";
    pub const CATALOG: &str = "catalog";
}

/// Store operation error.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("version conflict on {id}: expected {expected}, stored {stored}")]
    Conflict {
        id: String,
        expected: u64,
        stored: u64,
    },

    #[error("document already exists: {0}")]
    AlreadyExists(String),

    #[error("unknown catalog: {0}")]
    UnknownCatalog(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<StoreError> for DomainError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(_) => DomainError::NotFound,
            StoreError::Conflict {
                id,
                expected,
                stored,
            } => DomainError::conflict(format!(
                "document {id}: expected version {expected}, stored {stored}"
            )),
            other => DomainError::internal(other.to_string()),
        }
    }
}

/// Query filter over top-level document fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    /// Top-level field equals a value.
    Eq { field: String, value: Value },
    /// Top-level array field contains a value.
    Contains { field: String, value: Value },
    /// `created_at` or `last_modified_at` at or after the cutoff.
    ModifiedSince(DateTime<Utc>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::Eq {
            field: field.into(),
            value,
        }
    }

    pub fn contains(field: impl Into<String>, value: Value) -> Self {
        Self::Contains {
            field: field.into(),
            value,
        }
    }
}

/// Bulk array mutation applied by `update_many`.
///
/// The store cannot combine a removal and an insertion on the same array
/// field in one statement, which is why the ancestor-repair path issues two
/// of these back to back.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayUpdate {
    /// Remove every occurrence of each value from the array field.
    PullAll { field: String, values: Vec<Value> },
    /// Insert the values at the front of the array field, preserving order.
    PushFront { field: String, values: Vec<Value> },
}

impl ArrayUpdate {
    pub fn pull_all(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::PullAll {
            field: field.into(),
            values,
        }
    }

    pub fn push_front(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::PushFront {
            field: field.into(),
            values,
        }
    }
}

/// One collection of versioned documents.
///
/// Guarantees assumed from the backing store: per-document atomic conditional
/// update on the version field; no multi-document transactions.
pub trait Collection<T: VersionedEntity>: Send + Sync {
    fn find_one(&self, id: &str) -> Result<Option<T>, StoreError>;

    fn find(&self, filter: &Filter) -> Result<Vec<T>, StoreError>;

    /// Insert with system-assigned bookkeeping: version 0, fresh timestamps.
    fn insert_one(&self, doc: T) -> Result<T, StoreError>;

    /// Conditional update: applies the patch only if the stored version equals
    /// `expected_version`, then bumps the version and `last_modified_at`.
    fn update_one(&self, id: &str, expected_version: u64, patch: &Patch) -> Result<T, StoreError>;

    /// Bulk array mutation across every matching document. Does not touch
    /// version or timestamps (repair path, not the mutation protocol).
    fn update_many(&self, filter: &Filter, update: &ArrayUpdate) -> Result<usize, StoreError>;

    fn delete_one(&self, id: &str) -> Result<bool, StoreError>;

    fn count(&self, filter: &Filter) -> Result<usize, StoreError> {
        Ok(self.find(filter)?.len())
    }
}
