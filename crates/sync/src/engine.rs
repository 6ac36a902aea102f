//! The sync engine: scan, batch, and converge one catalog onto another.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use merx_core::{CatalogScoped, DomainResult, Patch, VersionedEntity, sync_patch};
use merx_store::{Catalogs, Collection, Filter, StoreError};

use crate::jobs::{JobQueue, SyncJob, SyncJobKind};
use crate::rule::CatalogSyncRule;

/// Target-local bookkeeping fields that a sync patch never copies or nulls.
pub const SYNC_EXCLUDED_FIELDS: [&str; 4] =
    ["version", "created_at", "last_modified_at", "catalog"];

const DEFAULT_BATCH_SIZE: usize = 1000;

/// One chunk of changed source documents to apply to the target catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub ids: Vec<String>,
    pub source_catalog: String,
    pub target_catalog: String,
    pub create_new_items: bool,
    /// Field names to copy; empty means all.
    pub properties_to_sync: Vec<String>,
}

/// Full-scan deletion of target documents with no source counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurgeJob {
    pub source_catalog: String,
    pub target_catalog: String,
}

/// What one run enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRunSummary {
    /// Source documents changed since the rule's cursor.
    pub scanned: usize,
    /// Batch jobs enqueued.
    pub batches: usize,
    pub started_at: DateTime<Utc>,
}

/// Per-batch application counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub updated: usize,
    pub created: usize,
    pub skipped: usize,
}

/// Scans a source catalog for changes and applies them to a target catalog.
///
/// `run` only enqueues work; batches execute on the worker pool (or any other
/// queue consumer). Batch application is idempotent per document, so the
/// queue's at-least-once delivery converges rather than corrupts.
pub struct SyncEngine<T: VersionedEntity> {
    catalogs: Arc<dyn Catalogs<T>>,
    rules: Arc<dyn Collection<CatalogSyncRule>>,
    queue: Arc<dyn JobQueue>,
    batch_size: usize,
}

impl<T: VersionedEntity + CatalogScoped> SyncEngine<T> {
    pub fn new(
        catalogs: Arc<dyn Catalogs<T>>,
        rules: Arc<dyn Collection<CatalogSyncRule>>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            catalogs,
            rules,
            queue,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Start one run of a rule: scan the source for documents changed since
    /// `last_sync`, enqueue them in chunks, then advance the cursor to this
    /// run's start time.
    ///
    /// The cursor moves only after every job is enqueued. A crash mid-run
    /// leaves it untouched and the next run re-scans the same window, which
    /// the idempotent batch path absorbs.
    pub fn run(&self, rule: &CatalogSyncRule) -> DomainResult<SyncRunSummary> {
        let started_at = Utc::now();
        let source = self.catalogs.collection(&rule.source_catalog)?;

        let changed = source.find(&Filter::ModifiedSince(rule.last_sync))?;
        let ids: Vec<String> = changed.iter().map(|doc| doc.id().to_string()).collect();

        let mut batches = 0;
        for chunk in ids.chunks(self.batch_size) {
            let job = SyncJob::new(SyncJobKind::ApplyBatch(BatchJob {
                ids: chunk.to_vec(),
                source_catalog: rule.source_catalog.clone(),
                target_catalog: rule.target_catalog.clone(),
                create_new_items: rule.create_new_items,
                properties_to_sync: rule.properties_to_sync.clone(),
            }));
            self.queue.enqueue(job)?;
            batches += 1;
        }

        if rule.remove_non_existent {
            self.queue.enqueue(SyncJob::new(SyncJobKind::PurgeOrphans(PurgeJob {
                source_catalog: rule.source_catalog.clone(),
                target_catalog: rule.target_catalog.clone(),
            })))?;
        }

        let cursor = Patch::new().set("last_sync", json!(started_at));
        self.rules.update_one(rule.id(), rule.version(), &cursor)?;

        info!(
            rule = rule.id(),
            scanned = ids.len(),
            batches,
            purge = rule.remove_non_existent,
            "sync run enqueued"
        );
        Ok(SyncRunSummary {
            scanned: ids.len(),
            batches,
            started_at,
        })
    }

    /// Execute one claimed job body.
    pub fn execute(&self, kind: &SyncJobKind) -> DomainResult<()> {
        match kind {
            SyncJobKind::ApplyBatch(batch) => self.apply_batch(batch).map(|_| ()),
            SyncJobKind::PurgeOrphans(purge) => self.purge_orphans(purge).map(|_| ()),
        }
    }

    /// Converge each target document in the batch onto its source state.
    ///
    /// Per document: a no-op patch writes nothing, and a version conflict on
    /// the target is skipped rather than fought. Either a concurrent worker
    /// already applied the change or a later run will.
    pub fn apply_batch(&self, batch: &BatchJob) -> DomainResult<BatchOutcome> {
        let source = self.catalogs.collection(&batch.source_catalog)?;
        let target = self.catalogs.collection(&batch.target_catalog)?;

        let mut outcome = BatchOutcome::default();
        for id in &batch.ids {
            let Some(src) = source.find_one(id)? else {
                // Deleted after the scan; the purge pass owns removals.
                outcome.skipped += 1;
                continue;
            };

            match target.find_one(id)? {
                Some(existing) => {
                    let src_doc = encode(&src)?;
                    let tgt_doc = encode(&existing)?;
                    let mut patch = sync_patch(&tgt_doc, &src_doc, &SYNC_EXCLUDED_FIELDS);
                    if !batch.properties_to_sync.is_empty() {
                        patch.retain_fields(&batch.properties_to_sync);
                    }
                    if patch.is_empty() {
                        outcome.skipped += 1;
                        continue;
                    }
                    match target.update_one(id, existing.version(), &patch) {
                        Ok(_) => outcome.updated += 1,
                        Err(StoreError::Conflict { .. }) => {
                            debug!(id, "target moved during batch, leaving for the next run");
                            outcome.skipped += 1;
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
                None if batch.create_new_items => {
                    let mut fresh = src.clone();
                    fresh.set_catalog(batch.target_catalog.clone());
                    target.insert_one(fresh)?;
                    outcome.created += 1;
                }
                None => outcome.skipped += 1,
            }
        }

        debug!(
            target = batch.target_catalog,
            updated = outcome.updated,
            created = outcome.created,
            skipped = outcome.skipped,
            "batch applied"
        );
        Ok(outcome)
    }

    /// Delete every target document whose id no longer exists in the source.
    pub fn purge_orphans(&self, purge: &PurgeJob) -> DomainResult<usize> {
        let source = self.catalogs.collection(&purge.source_catalog)?;
        let target = self.catalogs.collection(&purge.target_catalog)?;

        let mut removed = 0;
        for doc in target.find(&Filter::All)? {
            if source.find_one(doc.id())?.is_none() && target.delete_one(doc.id())? {
                removed += 1;
            }
        }

        info!(target = purge.target_catalog, removed, "orphan purge finished");
        Ok(removed)
    }
}

fn encode<T: VersionedEntity>(doc: &T) -> DomainResult<serde_json::Value> {
    serde_json::to_value(doc).map_err(|err| merx_core::DomainError::internal(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::InMemoryJobQueue;
    use crate::worker::{WorkerPool, WorkerPoolConfig};
    use merx_products::Product;
    use merx_store::{InMemoryCatalogs, InMemoryCollection};
    use std::time::{Duration, Instant};

    struct Fixture {
        catalogs: Arc<InMemoryCatalogs<Product>>,
        rules: Arc<InMemoryCollection<CatalogSyncRule>>,
        queue: Arc<InMemoryJobQueue>,
        engine: SyncEngine<Product>,
    }

    fn fixture() -> Fixture {
        let catalogs = Arc::new(InMemoryCatalogs::new());
        let rules = Arc::new(InMemoryCollection::new());
        let queue = Arc::new(InMemoryJobQueue::new());
        let engine = SyncEngine::new(
            catalogs.clone() as Arc<dyn Catalogs<Product>>,
            rules.clone() as Arc<dyn Collection<CatalogSyncRule>>,
            queue.clone() as Arc<dyn JobQueue>,
        );
        Fixture {
            catalogs,
            rules,
            queue,
            engine,
        }
    }

    fn rule(fx: &Fixture) -> CatalogSyncRule {
        fx.rules
            .insert_one(CatalogSyncRule::new("r1", "staged", "published"))
            .unwrap()
    }

    /// Run claimed jobs to completion on the calling thread.
    fn drain(fx: &Fixture) {
        while let Some(mut job) = fx.queue.claim_next().unwrap() {
            match fx.engine.execute(&job.kind) {
                Ok(()) => job.mark_completed(),
                Err(err) => job.mark_failed(err.to_string(), Duration::ZERO),
            }
            fx.queue.update(&job).unwrap();
        }
    }

    #[test]
    fn first_run_creates_missing_target_documents() {
        let fx = fixture();
        let staged = fx.catalogs.open("staged");
        staged
            .insert_one(Product::new("p1", "staged", "Shoe").with_sku("S-1"))
            .unwrap();
        staged.insert_one(Product::new("p2", "staged", "Hat")).unwrap();

        let summary = fx.engine.run(&rule(&fx)).unwrap();
        assert_eq!(summary.scanned, 2);
        assert_eq!(summary.batches, 1);
        drain(&fx);

        let published = fx.catalogs.open("published");
        let copy = published.find_one("p1").unwrap().unwrap();
        assert_eq!(copy.name, "Shoe");
        assert_eq!(copy.sku.as_deref(), Some("S-1"));
        assert_eq!(copy.catalog, "published");
        assert_eq!(copy.version, 0);
        assert!(published.find_one("p2").unwrap().is_some());
    }

    #[test]
    fn rerun_after_convergence_writes_nothing() {
        let fx = fixture();
        fx.catalogs
            .open("staged")
            .insert_one(Product::new("p1", "staged", "Shoe"))
            .unwrap();

        let first = rule(&fx);
        fx.engine.run(&first).unwrap();
        drain(&fx);
        let converged = fx.catalogs.open("published").find_one("p1").unwrap().unwrap();

        // The cursor advanced, so the second scan sees nothing new even
        // though the first run's window is re-coverable.
        let advanced = fx.rules.find_one("r1").unwrap().unwrap();
        assert!(advanced.last_sync > first.last_sync);
        let summary = fx.engine.run(&advanced).unwrap();
        assert_eq!(summary.scanned, 0);
        drain(&fx);

        let after = fx.catalogs.open("published").find_one("p1").unwrap().unwrap();
        assert_eq!(after, converged);
    }

    #[test]
    fn reapplying_a_batch_is_idempotent() {
        let fx = fixture();
        fx.catalogs
            .open("staged")
            .insert_one(Product::new("p1", "staged", "Shoe"))
            .unwrap();

        let batch = BatchJob {
            ids: vec!["p1".into()],
            source_catalog: "staged".into(),
            target_catalog: "published".into(),
            create_new_items: true,
            properties_to_sync: Vec::new(),
        };
        let first = fx.engine.apply_batch(&batch).unwrap();
        assert_eq!(first.created, 1);

        // Redelivery of the same batch: the target already matches.
        let second = fx.engine.apply_batch(&batch).unwrap();
        assert_eq!(second, BatchOutcome { updated: 0, created: 0, skipped: 1 });
        assert_eq!(
            fx.catalogs.open("published").find_one("p1").unwrap().unwrap().version,
            0
        );
    }

    #[test]
    fn changed_documents_are_patched_onto_the_target() {
        let fx = fixture();
        let staged = fx.catalogs.open("staged");
        staged.insert_one(Product::new("p1", "staged", "Shoe")).unwrap();
        fx.catalogs
            .open("published")
            .insert_one(Product::new("p1", "published", "Old Shoe"))
            .unwrap();

        fx.engine.run(&rule(&fx)).unwrap();
        drain(&fx);

        let copy = fx.catalogs.open("published").find_one("p1").unwrap().unwrap();
        assert_eq!(copy.name, "Shoe");
        assert_eq!(copy.catalog, "published");
        assert_eq!(copy.version, 1);
    }

    #[test]
    fn properties_to_sync_limits_the_copied_fields() {
        let fx = fixture();
        fx.catalogs
            .open("staged")
            .insert_one(Product::new("p1", "staged", "Shoe").with_sku("S-NEW"))
            .unwrap();
        fx.catalogs
            .open("published")
            .insert_one(Product::new("p1", "published", "Old").with_sku("S-OLD"))
            .unwrap();

        let rule = fx
            .rules
            .insert_one(
                CatalogSyncRule::new("r1", "staged", "published")
                    .with_properties(vec!["name".into()]),
            )
            .unwrap();
        fx.engine.run(&rule).unwrap();
        drain(&fx);

        let copy = fx.catalogs.open("published").find_one("p1").unwrap().unwrap();
        assert_eq!(copy.name, "Shoe");
        assert_eq!(copy.sku.as_deref(), Some("S-OLD"));
    }

    #[test]
    fn without_creation_unknown_documents_are_skipped() {
        let fx = fixture();
        fx.catalogs
            .open("staged")
            .insert_one(Product::new("p1", "staged", "Shoe"))
            .unwrap();

        let rule = fx
            .rules
            .insert_one(CatalogSyncRule::new("r1", "staged", "published").without_creation())
            .unwrap();
        fx.engine.run(&rule).unwrap();
        drain(&fx);

        assert!(fx.catalogs.open("published").find_one("p1").unwrap().is_none());
    }

    #[test]
    fn scan_is_chunked_into_batches() {
        let fx = fixture();
        let staged = fx.catalogs.open("staged");
        for i in 0..5 {
            staged
                .insert_one(Product::new(format!("p{i}"), "staged", "Item"))
                .unwrap();
        }

        let engine = SyncEngine::new(
            fx.catalogs.clone() as Arc<dyn Catalogs<Product>>,
            fx.rules.clone() as Arc<dyn Collection<CatalogSyncRule>>,
            fx.queue.clone() as Arc<dyn JobQueue>,
        )
        .with_batch_size(2);
        let summary = engine.run(&rule(&fx)).unwrap();
        assert_eq!(summary.batches, 3);
        assert_eq!(fx.queue.stats().unwrap().pending, 3);
    }

    #[test]
    fn purge_removes_target_orphans_only() {
        let fx = fixture();
        fx.catalogs
            .open("staged")
            .insert_one(Product::new("keep", "staged", "Keep"))
            .unwrap();
        let published = fx.catalogs.open("published");
        published.insert_one(Product::new("keep", "published", "Keep")).unwrap();
        published.insert_one(Product::new("orphan", "published", "Gone")).unwrap();

        let removed = fx
            .engine
            .purge_orphans(&PurgeJob {
                source_catalog: "staged".into(),
                target_catalog: "published".into(),
            })
            .unwrap();
        assert_eq!(removed, 1);
        assert!(published.find_one("keep").unwrap().is_some());
        assert!(published.find_one("orphan").unwrap().is_none());
    }

    #[test]
    fn remove_non_existent_enqueues_a_purge_job() {
        let fx = fixture();
        let rule = fx
            .rules
            .insert_one(CatalogSyncRule::new("r1", "staged", "published").removing_non_existent())
            .unwrap();
        fx.engine.run(&rule).unwrap();

        let job = fx.queue.claim_next().unwrap().unwrap();
        assert!(matches!(job.kind, SyncJobKind::PurgeOrphans(_)));
    }

    #[test]
    fn worker_pool_drains_a_run() {
        merx_observability::init();
        let fx = fixture();
        let staged = fx.catalogs.open("staged");
        for i in 0..20 {
            staged
                .insert_one(Product::new(format!("p{i}"), "staged", "Item"))
                .unwrap();
        }

        let engine = Arc::new(
            SyncEngine::new(
                fx.catalogs.clone() as Arc<dyn Catalogs<Product>>,
                fx.rules.clone() as Arc<dyn Collection<CatalogSyncRule>>,
                fx.queue.clone() as Arc<dyn JobQueue>,
            )
            .with_batch_size(4),
        );
        let pool = WorkerPool::spawn(
            engine.clone(),
            fx.queue.clone() as Arc<dyn JobQueue>,
            WorkerPoolConfig::default().with_workers(3),
        );

        let summary = engine.run(&rule(&fx)).unwrap();
        assert_eq!(summary.batches, 5);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !fx.queue.stats().unwrap().is_drained() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        pool.shutdown();

        let stats = fx.queue.stats().unwrap();
        assert_eq!(stats.completed, 5);
        assert_eq!(stats.dead_lettered, 0);
        let published = fx.catalogs.open("published");
        assert_eq!(published.count(&Filter::All).unwrap(), 20);
    }

    /// Catalog resolver that always fails, to exercise the retry path.
    struct BrokenCatalogs;

    impl Catalogs<Product> for BrokenCatalogs {
        fn collection(&self, catalog: &str) -> Result<Arc<dyn Collection<Product>>, StoreError> {
            Err(StoreError::UnknownCatalog(catalog.to_string()))
        }
    }

    #[test]
    fn failing_jobs_retry_then_dead_letter() {
        merx_observability::init();
        let rules = Arc::new(InMemoryCollection::new());
        let queue = Arc::new(InMemoryJobQueue::new());
        let engine = Arc::new(SyncEngine::new(
            Arc::new(BrokenCatalogs) as Arc<dyn Catalogs<Product>>,
            rules as Arc<dyn Collection<CatalogSyncRule>>,
            queue.clone() as Arc<dyn JobQueue>,
        ));

        queue
            .enqueue(SyncJob::new(SyncJobKind::PurgeOrphans(PurgeJob {
                source_catalog: "staged".into(),
                target_catalog: "published".into(),
            })))
            .unwrap();

        let pool = WorkerPool::spawn(
            engine,
            queue.clone() as Arc<dyn JobQueue>,
            WorkerPoolConfig::default()
                .with_workers(1)
                .with_retry_delay(Duration::from_millis(1)),
        );
        let deadline = Instant::now() + Duration::from_secs(5);
        while queue.stats().unwrap().dead_lettered == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        let worker_stats = pool.stats();
        pool.shutdown();

        assert!(queue.claim_next().unwrap().is_none());
        assert_eq!(queue.stats().unwrap().dead_lettered, 1);
        assert_eq!(worker_stats.jobs_failed, 3);
        assert_eq!(worker_stats.jobs_dead_lettered, 1);
    }
}
