//! `merx-sync`: staged-to-published catalog reconciliation.
//!
//! The engine diffs a source catalog against a target catalog and applies
//! changes in bulk through an at-least-once job queue consumed by a worker
//! pool. Convergence is idempotent per document: patches are computed fresh
//! against the current target state and a no-op patch is never written.

pub mod engine;
pub mod jobs;
pub mod rule;
pub mod worker;

pub use engine::{BatchJob, BatchOutcome, PurgeJob, SYNC_EXCLUDED_FIELDS, SyncEngine, SyncRunSummary};
pub use jobs::{
    InMemoryJobQueue, JobId, JobQueue, JobQueueError, JobStatus, QueueStats, SyncJob, SyncJobKind,
};
pub use rule::CatalogSyncRule;
pub use worker::{WorkerPool, WorkerPoolConfig, WorkerStats};
