//! Catalog sync rule: which catalogs to reconcile, how, and since when.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use merx_core::{DomainError, DomainResult, VersionedEntity};

/// Configuration of one staged-to-published reconciliation.
///
/// `last_sync` is the change-since cursor: a run scans only source documents
/// created or modified at or after it, and advances it to the run's start
/// time once all batches are enqueued. That makes a run safely interruptible
/// and resumable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSyncRule {
    pub id: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    pub source_catalog: String,
    pub target_catalog: String,
    /// Delete target documents with no surviving source counterpart.
    /// Correctness-optional and expensive: runs as its own job, never on the
    /// batch path.
    pub remove_non_existent: bool,
    pub create_new_items: bool,
    /// Field names to copy; empty means all.
    pub properties_to_sync: Vec<String>,
    /// Five-field cron expression for scheduled runs (scheduling itself is
    /// bootstrap's concern).
    pub run_at: String,
    pub last_sync: DateTime<Utc>,
}

impl CatalogSyncRule {
    pub fn new(
        id: impl Into<String>,
        source_catalog: impl Into<String>,
        target_catalog: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            version: 0,
            created_at: now,
            last_modified_at: now,
            source_catalog: source_catalog.into(),
            target_catalog: target_catalog.into(),
            remove_non_existent: false,
            create_new_items: true,
            properties_to_sync: Vec::new(),
            run_at: "0 * * * *".to_string(),
            last_sync: DateTime::<Utc>::MIN_UTC,
        }
    }

    pub fn with_schedule(mut self, run_at: impl Into<String>) -> DomainResult<Self> {
        let run_at = run_at.into();
        validate_schedule(&run_at)?;
        self.run_at = run_at;
        Ok(self)
    }

    pub fn with_properties(mut self, properties: Vec<String>) -> Self {
        self.properties_to_sync = properties;
        self
    }

    pub fn removing_non_existent(mut self) -> Self {
        self.remove_non_existent = true;
        self
    }

    pub fn without_creation(mut self) -> Self {
        self.create_new_items = false;
        self
    }
}

/// Shape check of a five-field cron expression.
fn validate_schedule(expr: &str) -> DomainResult<()> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(DomainError::validation(format!(
            "run_at: expected 5 cron fields, got {}",
            fields.len()
        )));
    }
    for field in fields {
        if !field
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '*' | '/' | ',' | '-'))
        {
            return Err(DomainError::validation(format!(
                "run_at: invalid cron field '{field}'"
            )));
        }
    }
    Ok(())
}

impl VersionedEntity for CatalogSyncRule {
    const KIND: &'static str = "catalog-sync-rule";

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_cron_expressions() {
        assert!(CatalogSyncRule::new("r1", "staged", "published")
            .with_schedule("*/15 0-6 * * 1,5")
            .is_ok());
    }

    #[test]
    fn rejects_malformed_schedules() {
        let rule = CatalogSyncRule::new("r1", "staged", "published");
        assert!(rule.clone().with_schedule("* * *").is_err());
        assert!(rule.with_schedule("* * * * x").is_err());
    }
}
