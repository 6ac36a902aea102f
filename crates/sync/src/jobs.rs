//! Sync job queue: at-least-once delivery with bounded retries.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::engine::{BatchJob, PurgeJob};

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The unit of work carried by one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobKind {
    /// Apply one chunk of changed documents to the target catalog.
    ApplyBatch(BatchJob),
    /// Delete target documents with no source counterpart.
    PurgeOrphans(PurgeJob),
}

impl SyncJobKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            SyncJobKind::ApplyBatch(_) => "apply_batch",
            SyncJobKind::PurgeOrphans(_) => "purge_orphans",
        }
    }
}

/// Job execution status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued, waiting to be picked up.
    Pending,
    /// Currently held by a worker.
    Running,
    /// Finished successfully.
    Completed,
    /// Failed, will be retried after its scheduled delay.
    Failed { error: String, attempt: u32 },
    /// Exhausted retries.
    DeadLettered { error: String, attempts: u32 },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::DeadLettered { .. })
    }
}

/// A queued sync job.
///
/// Delivery is at least once: a worker may crash between executing a job and
/// recording completion, so every job body must tolerate re-execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: JobId,
    pub kind: SyncJobKind,
    pub status: JobStatus,
    /// Attempts started so far, including the current one while Running.
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    /// Earliest time the job may (re-)run. None means immediately.
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl SyncJob {
    pub fn new(kind: SyncJobKind) -> Self {
        Self {
            id: JobId::new(),
            kind,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: 3,
            created_at: Utc::now(),
            scheduled_at: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn is_ready(&self) -> bool {
        match self.scheduled_at {
            Some(at) => Utc::now() >= at,
            None => true,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.attempts += 1;
    }

    pub fn mark_completed(&mut self) {
        self.status = JobStatus::Completed;
    }

    /// Record a failed attempt: schedule a retry, or dead-letter once the
    /// attempt budget is spent.
    pub fn mark_failed(&mut self, error: String, retry_delay: Duration) {
        if self.attempts < self.max_attempts {
            self.scheduled_at =
                Some(Utc::now() + chrono::Duration::from_std(retry_delay).unwrap_or_default());
            self.status = JobStatus::Failed {
                error,
                attempt: self.attempts,
            };
        } else {
            self.status = JobStatus::DeadLettered {
                error,
                attempts: self.attempts,
            };
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum JobQueueError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("queue storage failure: {0}")]
    Storage(String),
}

impl From<JobQueueError> for merx_core::DomainError {
    fn from(value: JobQueueError) -> Self {
        merx_core::DomainError::internal(value.to_string())
    }
}

/// Snapshot of queue occupancy by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub dead_lettered: usize,
}

impl QueueStats {
    /// True once no job can make further progress.
    pub fn is_drained(&self) -> bool {
        self.pending == 0 && self.running == 0 && self.failed == 0
    }
}

/// Queue abstraction consumed by the worker pool.
pub trait JobQueue: Send + Sync {
    fn enqueue(&self, job: SyncJob) -> Result<JobId, JobQueueError>;

    /// Claim the oldest ready job and mark it Running. Claiming and marking
    /// happen under one lock so two workers never hold the same job.
    fn claim_next(&self) -> Result<Option<SyncJob>, JobQueueError>;

    fn update(&self, job: &SyncJob) -> Result<(), JobQueueError>;

    fn get(&self, id: JobId) -> Result<Option<SyncJob>, JobQueueError>;

    fn stats(&self) -> Result<QueueStats, JobQueueError>;
}

/// In-memory queue for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    jobs: RwLock<HashMap<JobId, SyncJob>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobQueue for InMemoryJobQueue {
    fn enqueue(&self, job: SyncJob) -> Result<JobId, JobQueueError> {
        let mut jobs = self.jobs.write().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(JobQueueError::AlreadyExists(job.id));
        }
        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    fn claim_next(&self) -> Result<Option<SyncJob>, JobQueueError> {
        let mut jobs = self.jobs.write().unwrap();

        let mut candidates: Vec<_> = jobs
            .values()
            .filter(|j| {
                matches!(j.status, JobStatus::Pending | JobStatus::Failed { .. }) && j.is_ready()
            })
            .collect();
        // FIFO by creation time.
        candidates.sort_by_key(|j| j.created_at);

        let Some(id) = candidates.first().map(|j| j.id) else {
            return Ok(None);
        };
        let job = jobs.get_mut(&id).ok_or(JobQueueError::NotFound(id))?;
        job.mark_running();
        Ok(Some(job.clone()))
    }

    fn update(&self, job: &SyncJob) -> Result<(), JobQueueError> {
        let mut jobs = self.jobs.write().unwrap();
        if !jobs.contains_key(&job.id) {
            return Err(JobQueueError::NotFound(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    fn get(&self, id: JobId) -> Result<Option<SyncJob>, JobQueueError> {
        Ok(self.jobs.read().unwrap().get(&id).cloned())
    }

    fn stats(&self) -> Result<QueueStats, JobQueueError> {
        let jobs = self.jobs.read().unwrap();
        let mut stats = QueueStats::default();
        for job in jobs.values() {
            match &job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed { .. } => stats.failed += 1,
                JobStatus::DeadLettered { .. } => stats.dead_lettered += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn purge_job() -> SyncJob {
        SyncJob::new(SyncJobKind::PurgeOrphans(PurgeJob {
            source_catalog: "staged".into(),
            target_catalog: "published".into(),
        }))
    }

    #[test]
    fn enqueue_and_claim_is_fifo() {
        let queue = InMemoryJobQueue::new();
        let first = queue.enqueue(purge_job()).unwrap();
        let second = queue.enqueue(purge_job()).unwrap();

        let claimed = queue.claim_next().unwrap().unwrap();
        assert_eq!(claimed.id, first);
        assert_eq!(claimed.status, JobStatus::Running);
        assert_eq!(claimed.attempts, 1);

        assert_eq!(queue.claim_next().unwrap().unwrap().id, second);
        assert!(queue.claim_next().unwrap().is_none());
    }

    #[test]
    fn failed_job_is_retried_then_dead_lettered() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(purge_job().with_max_attempts(2)).unwrap();

        let mut job = queue.claim_next().unwrap().unwrap();
        job.mark_failed("boom".into(), Duration::ZERO);
        assert!(matches!(job.status, JobStatus::Failed { attempt: 1, .. }));
        queue.update(&job).unwrap();

        let mut job = queue.claim_next().unwrap().unwrap();
        assert_eq!(job.attempts, 2);
        job.mark_failed("boom".into(), Duration::ZERO);
        assert!(matches!(job.status, JobStatus::DeadLettered { attempts: 2, .. }));
        queue.update(&job).unwrap();

        assert!(queue.claim_next().unwrap().is_none());
        let stats = queue.stats().unwrap();
        assert_eq!(stats.dead_lettered, 1);
        assert!(stats.is_drained());
    }

    #[test]
    fn scheduled_jobs_wait_for_their_time() {
        let queue = InMemoryJobQueue::new();
        let mut job = purge_job();
        job.scheduled_at = Some(Utc::now() + chrono::Duration::hours(1));
        queue.enqueue(job).unwrap();

        assert!(queue.claim_next().unwrap().is_none());
        assert_eq!(queue.stats().unwrap().pending, 1);
    }
}
