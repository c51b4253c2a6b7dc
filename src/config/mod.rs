//! Configuration management for chapterbox
//!
//! Settings are layered, lowest priority first:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables
//!
//! # Usage
//!
//! ```no_run
//! use chapterbox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Any key can be overridden with `CHAPTERBOX__<section>__<key>`:
//! - `CHAPTERBOX__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `CHAPTERBOX__SCHEDULER__WORKERS=4`
//! - `CHAPTERBOX__CHAPTERS__METHOD=zip`
//!
//! # Configuration File
//!
//! By default the file is `config/chapterbox.toml`; set `CHAPTERBOX_CONFIG`
//! to read another one.

mod models;
mod profile;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    CacheConfig, ChaptersConfig, Config, MarksConfig, RequestsConfig, SchedulerConfig,
    ServerConfig, SiteConfig,
};
pub use profile::OutputProfile;
pub use sources::{CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH};
pub use validation::ValidationError;

use crate::http::{HttpCache, HttpClientConfig};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or validation fails (bad
    /// filename template, unknown archive method, out of range cache or worker
    /// settings).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path.as_ref())?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Archive settings for `site`, falling back to `[chapters]`
    pub fn output_profile(&self, site: &str) -> Result<OutputProfile, ValidationError> {
        let overrides = self.sites.get(site);
        let scope = match overrides {
            Some(_) => format!("sites.{site}"),
            None => "chapters".to_string(),
        };
        OutputProfile::resolve(&scope, &self.chapters, overrides)
    }

    /// Free-form plugin options of `site`
    pub fn site_options(&self, site: &str) -> BTreeMap<String, String> {
        self.sites
            .get(site)
            .map(|s| s.options.clone())
            .unwrap_or_default()
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig::builder()
            .connect_timeout(Duration::from_secs(self.requests.connect_timeout_secs))
            .read_timeout(Duration::from_secs(self.requests.read_timeout_secs))
            .user_agent(self.requests.user_agent.clone())
            .build()
    }

    pub fn http_cache(&self) -> HttpCache {
        HttpCache::new(
            self.requests.cache.maxlen,
            Duration::from_secs(self.requests.cache.threshold_secs),
        )
    }
}
