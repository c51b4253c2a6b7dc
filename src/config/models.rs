use crate::http::client::DEFAULT_USER_AGENT;
use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub requests: RequestsConfig,
    #[serde(default)]
    pub marks: MarksConfig,
    #[serde(default)]
    pub chapters: ChaptersConfig,
    /// Per-site overrides keyed by site name (e.g. `"mangadex.org"`)
    #[serde(default)]
    pub sites: BTreeMap<String, SiteConfig>,
}

/// HTTP front end
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: ByteSize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8080))
}

fn default_max_payload_bytes() -> ByteSize {
    ByteSize::mib(1)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    1
}

/// Outbound HTTP settings shared by every plugin
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestsConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for RequestsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            user_agent: default_user_agent(),
            cache: CacheConfig::default(),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_read_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_maxlen")]
    pub maxlen: usize,
    #[serde(default = "default_cache_threshold_secs")]
    pub threshold_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            maxlen: default_cache_maxlen(),
            threshold_secs: default_cache_threshold_secs(),
        }
    }
}

fn default_cache_maxlen() -> usize {
    100
}

fn default_cache_threshold_secs() -> u64 {
    600
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarksConfig {
    #[serde(default = "default_marks_path")]
    pub path: PathBuf,
}

impl Default for MarksConfig {
    fn default() -> Self {
        Self {
            path: default_marks_path(),
        }
    }
}

fn default_marks_path() -> PathBuf {
    PathBuf::from("data/marks")
}

/// Archive output defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChaptersConfig {
    /// `files`, `zip` or `cbz`
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_destination")]
    pub destination: PathBuf,
    /// Filename template, see [`crate::archive::naming`]
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// One folder per manga instead of a single mixed folder
    #[serde(default)]
    pub separate: bool,
    #[serde(default = "default_fallback_extension")]
    pub fallback_extension: String,
}

impl Default for ChaptersConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
            destination: default_destination(),
            format: default_format(),
            page_delay_ms: default_page_delay_ms(),
            separate: false,
            fallback_extension: default_fallback_extension(),
        }
    }
}

fn default_method() -> String {
    "cbz".to_string()
}

fn default_destination() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_format() -> String {
    crate::archive::naming::DEFAULT_TEMPLATE.to_string()
}

fn default_page_delay_ms() -> u64 {
    250
}

fn default_fallback_extension() -> String {
    "png".to_string()
}

/// Site overrides; unset keys inherit from `[chapters]`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SiteConfig {
    pub method: Option<String>,
    pub destination: Option<PathBuf>,
    pub format: Option<String>,
    pub page_delay_ms: Option<u64>,
    pub separate: Option<bool>,
    pub fallback_extension: Option<String>,
    /// Plugin specific settings
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.server.max_payload_bytes, ByteSize::mib(1));
        assert_eq!(config.scheduler.workers, 1);
        assert_eq!(config.requests.cache.maxlen, 100);
        assert_eq!(config.chapters.method, "cbz");
        assert!(config.sites.is_empty());
    }
}
