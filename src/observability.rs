//! Logging setup and process counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::http::HttpCache;

/// Install the global tracing subscriber
///
/// Honors `RUST_LOG`, defaulting to `info`. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Counters for jobs, pages and the shared response cache
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_submitted: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_cancelled: AtomicU64,
    pages_fetched: AtomicU64,
    bytes_written: AtomicU64,
    cache: Option<Arc<HttpCache>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report hit and miss counts of `cache` alongside the job counters
    pub fn with_cache(cache: Arc<HttpCache>) -> Self {
        Self {
            cache: Some(cache),
            ..Self::default()
        }
    }

    pub fn job_submitted(&self) {
        self.jobs_submitted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_submitted", "Metric incremented");
    }

    pub fn job_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_completed", "Metric incremented");
    }

    pub fn job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_failed", "Metric incremented");
    }

    pub fn job_cancelled(&self) {
        self.jobs_cancelled.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_cancelled", "Metric incremented");
    }

    pub fn page_fetched(&self, bytes: usize) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let cache = self.cache.as_ref().map(|cache| cache.stats());
        MetricsSnapshot {
            jobs_submitted: self.jobs_submitted.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_cancelled: self.jobs_cancelled.load(Ordering::Relaxed),
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            cache_hits: cache.as_ref().map_or(0, |s| s.hits),
            cache_misses: cache.as_ref().map_or(0, |s| s.misses),
            cache_entries: cache.as_ref().map_or(0, |s| s.entries),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_submitted: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_cancelled: u64,
    pub pages_fetched: u64,
    pub bytes_written: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_entries: usize,
}
