//! Download job scheduling
//!
//! Every requested chapter becomes a job tracked in a [`JobIndex`] and
//! executed on a fixed [`WorkerPool`]. Jobs move strictly forward through
//! [`JobState`]; once terminal they are kept in the history until
//! [`Scheduler::clear_history`].
//!
//! Cancellation is immediate for jobs that have not started. A running job
//! is flagged and stops at its next page checkpoint, discarding partial
//! output. Jobs already saving run to completion.

mod error;
mod index;
mod job;
mod pool;
mod runner;

pub use error::{JobError, Result, SchedulerError};
pub use index::{JobIndex, MAX_ID_ATTEMPTS};
pub use job::{JobId, JobSnapshot, JobState};
pub use pool::WorkerPool;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::marks::MarkSink;
use crate::observability::Metrics;
use crate::plugins::PluginRegistry;
use index::CancelOutcome;
use runner::JobEnvelope;

pub(crate) struct Shared {
    pub index: RwLock<JobIndex>,
    pub marks: Option<Arc<dyn MarkSink>>,
    pub metrics: Arc<Metrics>,
}

/// Owns the job index and the worker pool
pub struct Scheduler {
    registry: Arc<PluginRegistry>,
    shared: Arc<Shared>,
    pool: WorkerPool<JobEnvelope>,
}

impl Scheduler {
    /// Start `workers` workers; must run inside a tokio runtime
    pub fn new(
        registry: Arc<PluginRegistry>,
        workers: usize,
        marks: Option<Arc<dyn MarkSink>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let shared = Arc::new(Shared {
            index: RwLock::new(JobIndex::new()),
            marks,
            metrics,
        });

        let worker_shared = Arc::clone(&shared);
        let pool = WorkerPool::spawn(workers, move |worker_id, envelope| {
            runner::run_job(Arc::clone(&worker_shared), worker_id, envelope)
        });

        Self { registry, shared, pool }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn num_workers(&self) -> usize {
        self.pool.num_workers()
    }

    pub fn health_check(&self) -> bool {
        self.pool.health_check()
    }

    /// Queue one chapter of `site`
    pub async fn submit(&self, site: &str, chapter_id: &str, register_mark: bool) -> Result<JobId> {
        let chapter_id = chapter_id.trim();
        if chapter_id.is_empty() {
            return Err(SchedulerError::InvalidInput("chapter id must not be empty".to_string()));
        }

        let target = self.registry.get(site)?;
        let site = target.plugin.site().to_string();

        let mut index = self.shared.index.write().await;
        let id = index.allocate(&site, chapter_id, register_mark, Utc::now())?;

        let envelope = JobEnvelope {
            id: id.clone(),
            chapter: chapter_id.to_string(),
            target,
        };
        if self.pool.dispatch(envelope).is_err() {
            index.finalize(&id, JobState::Failed, Some("worker pool is shut down".to_string()), Utc::now());
            return Err(SchedulerError::PoolClosed);
        }
        index.advance(&id, JobState::Queued);
        drop(index);

        self.shared.metrics.job_submitted();
        info!(%id, site, chapter = chapter_id, register_mark, "Chapter queued");
        Ok(id)
    }

    /// Queue several chapters of one site, stopping at the first error
    pub async fn submit_many(&self, site: &str, chapter_ids: &[String], register_mark: bool) -> Result<Vec<JobId>> {
        let mut ids = Vec::with_capacity(chapter_ids.len());
        for chapter_id in chapter_ids {
            ids.push(self.submit(site, chapter_id, register_mark).await?);
        }
        Ok(ids)
    }

    /// Snapshot of one job
    ///
    /// Unknown ids are an error unless `best_effort` is set, in which case
    /// they yield `None`.
    pub async fn state(&self, id: &JobId, best_effort: bool) -> Result<Option<JobSnapshot>> {
        match self.shared.index.read().await.snapshot(id) {
            Some(snapshot) => Ok(Some(snapshot)),
            None if best_effort => Ok(None),
            None => Err(SchedulerError::NotFound(id.clone())),
        }
    }

    /// Snapshots of `ids`, or of every known job when `ids` is `None`
    pub async fn states(&self, ids: Option<&[JobId]>, best_effort: bool) -> Result<Vec<JobSnapshot>> {
        let index = self.shared.index.read().await;
        let Some(ids) = ids else {
            return Ok(index.snapshots());
        };

        let mut snapshots = Vec::with_capacity(ids.len());
        for id in ids {
            match index.snapshot(id) {
                Some(snapshot) => snapshots.push(snapshot),
                None if best_effort => continue,
                None => return Err(SchedulerError::NotFound(id.clone())),
            }
        }
        Ok(snapshots)
    }

    /// Request cancellation; true when the job is or will end `CANCELLED`
    pub async fn cancel(&self, id: &JobId) -> Result<bool> {
        let outcome = self.shared.index.write().await.request_cancel(id, Utc::now());
        match outcome {
            CancelOutcome::Finalized(_) => {
                self.shared.metrics.job_cancelled();
                info!(%id, "Job cancelled before start");
                Ok(true)
            }
            CancelOutcome::Flagged => {
                info!(%id, "Cancellation requested for running job");
                Ok(true)
            }
            CancelOutcome::Refused => {
                debug!(%id, "Job can no longer be cancelled");
                Ok(false)
            }
            CancelOutcome::Unknown => Err(SchedulerError::NotFound(id.clone())),
        }
    }

    /// Cancel several jobs; unknown ids report `false`
    pub async fn cancel_all(&self, ids: &[JobId]) -> BTreeMap<JobId, bool> {
        let mut results = BTreeMap::new();
        for id in ids {
            let cancelled = self.cancel(id).await.unwrap_or(false);
            results.insert(id.clone(), cancelled);
        }
        results
    }

    /// Drop finished jobs from the index; returns how many were removed
    pub async fn clear_history(&self) -> usize {
        let cleared = self.shared.index.write().await.clear_history();
        info!(cleared, "Job history cleared");
        cleared
    }

    /// Stop accepting work and wait for queued jobs to finish
    pub async fn shutdown(self) {
        self.pool.shutdown().await;
    }
}
