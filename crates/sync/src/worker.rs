//! Worker pool draining the sync job queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use merx_core::{CatalogScoped, VersionedEntity};

use crate::engine::SyncEngine;
use crate::jobs::{JobQueue, JobStatus, SyncJob};

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub workers: usize,
    /// How long an idle worker sleeps between polls.
    pub poll_interval: Duration,
    /// Delay before a failed job becomes claimable again.
    pub retry_delay: Duration,
    /// Thread name prefix for logging.
    pub name: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            poll_interval: Duration::from_millis(25),
            retry_delay: Duration::from_millis(500),
            name: "sync-worker".to_string(),
        }
    }
}

impl WorkerPoolConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Cumulative counters across all workers in the pool.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct WorkerStats {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_dead_lettered: u64,
}

/// Handle to a running pool. Dropping it without calling [`shutdown`]
/// detaches the workers; they keep draining the queue.
///
/// [`shutdown`]: WorkerPool::shutdown
pub struct WorkerPool {
    shutdown: Arc<AtomicBool>,
    joins: Vec<thread::JoinHandle<()>>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl WorkerPool {
    /// Start `config.workers` threads executing jobs against the engine.
    pub fn spawn<T>(
        engine: Arc<SyncEngine<T>>,
        queue: Arc<dyn JobQueue>,
        config: WorkerPoolConfig,
    ) -> Self
    where
        T: VersionedEntity + CatalogScoped,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(Mutex::new(WorkerStats::default()));

        let joins = (0..config.workers.max(1))
            .map(|i| {
                let engine = engine.clone();
                let queue = queue.clone();
                let shutdown = shutdown.clone();
                let stats = stats.clone();
                let config = config.clone();
                thread::Builder::new()
                    .name(format!("{}-{i}", config.name))
                    .spawn(move || worker_loop(engine, queue, config, shutdown, stats))
                    .expect("failed to spawn sync worker thread")
            })
            .collect();

        Self {
            shutdown,
            joins,
            stats,
        }
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.lock().unwrap().clone()
    }

    /// Stop polling and wait for in-flight jobs to finish.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for join in self.joins.drain(..) {
            let _ = join.join();
        }
        info!("sync worker pool stopped");
    }
}

fn worker_loop<T: VersionedEntity + CatalogScoped>(
    engine: Arc<SyncEngine<T>>,
    queue: Arc<dyn JobQueue>,
    config: WorkerPoolConfig,
    shutdown: Arc<AtomicBool>,
    stats: Arc<Mutex<WorkerStats>>,
) {
    while !shutdown.load(Ordering::Relaxed) {
        let claimed = match queue.claim_next() {
            Ok(claimed) => claimed,
            Err(err) => {
                error!(%err, "claiming next sync job failed");
                thread::sleep(config.poll_interval);
                continue;
            }
        };
        let Some(mut job) = claimed else {
            thread::sleep(config.poll_interval);
            continue;
        };

        run_job(&engine, &queue, &config, &stats, &mut job);
    }
}

fn run_job<T: VersionedEntity + CatalogScoped>(
    engine: &SyncEngine<T>,
    queue: &Arc<dyn JobQueue>,
    config: &WorkerPoolConfig,
    stats: &Arc<Mutex<WorkerStats>>,
    job: &mut SyncJob,
) {
    debug!(job = %job.id, kind = job.kind.type_name(), attempt = job.attempts, "executing sync job");

    let result = engine.execute(&job.kind);
    {
        let mut stats = stats.lock().unwrap();
        stats.jobs_processed += 1;
        match &result {
            Ok(()) => stats.jobs_succeeded += 1,
            Err(_) => stats.jobs_failed += 1,
        }
    }

    match result {
        Ok(()) => job.mark_completed(),
        Err(err) => {
            warn!(job = %job.id, %err, attempt = job.attempts, "sync job failed");
            job.mark_failed(err.to_string(), config.retry_delay);
            if let JobStatus::DeadLettered { .. } = job.status {
                stats.lock().unwrap().jobs_dead_lettered += 1;
                error!(job = %job.id, attempts = job.attempts, "sync job dead-lettered");
            }
        }
    }

    if let Err(err) = queue.update(job) {
        error!(job = %job.id, %err, "recording sync job outcome failed");
    }
}
