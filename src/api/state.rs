use std::sync::Arc;

use crate::config::Config;
use crate::http::HttpCache;
use crate::marks::{FjallMarks, MarkSink};
use crate::observability::Metrics;
use crate::plugins::{PluginRegistry, build_registry};
use crate::scheduler::Scheduler;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<PluginRegistry>,
    pub scheduler: Arc<Scheduler>,
    pub marks: Arc<FjallMarks>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Config,
        registry: Arc<PluginRegistry>,
        scheduler: Arc<Scheduler>,
        marks: Arc<FjallMarks>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            scheduler,
            marks,
            metrics,
        }
    }

    /// Wire every component from `config`; spawns the scheduler workers
    pub fn from_config(config: Config) -> Result<Self, AnyError> {
        let cache = Arc::new(config.http_cache());
        let registry = build_registry(&config, Arc::clone(&cache))?;
        let marks = FjallMarks::open(&config.marks.path)?;
        Ok(Self::with_registry(config, registry, marks, cache))
    }

    /// Wire an already built registry; spawns the scheduler workers
    pub fn with_registry(config: Config, registry: PluginRegistry, marks: FjallMarks, cache: Arc<HttpCache>) -> Self {
        let metrics = Arc::new(Metrics::with_cache(cache));
        let registry = Arc::new(registry);
        let marks = Arc::new(marks);
        let sink: Arc<dyn MarkSink> = marks.clone();
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&registry),
            config.scheduler.workers,
            Some(sink),
            Arc::clone(&metrics),
        ));
        Self::new(config, registry, scheduler, marks, metrics)
    }
}
