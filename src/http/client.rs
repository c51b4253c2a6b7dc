//! HTTP client for metadata reads and page downloads

use bon::Builder;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::cache::HttpCache;
use super::policy::RetryPolicy;

pub const DEFAULT_USER_AGENT: &str = concat!("chapterbox/", env!("CARGO_PKG_VERSION"));

/// Headers that take part in the cache key because they change the payload.
const NEGOTIATION_HEADERS: &[&str] = &["accept", "accept-language"];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("resource not found at {url}")]
    NotFound { url: String },

    #[error("request to {url} yielded status {status} {reason}")]
    QueryFailed {
        url: String,
        status: u16,
        reason: String,
    },

    #[error("connection to {url} failed: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("pagination loop detected, {url} was already visited")]
    AggregationLoop { url: String },

    #[error("invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// HTTP client configuration
#[derive(Debug, Clone, Builder)]
pub struct HttpClientConfig {
    #[builder(default = Duration::from_secs(10))]
    pub connect_timeout: Duration,
    #[builder(default = Duration::from_secs(60))]
    pub read_timeout: Duration,
    #[builder(into, default = DEFAULT_USER_AGENT.to_string())]
    pub user_agent: String,
    /// Headers sent with every request (e.g. `Referer` for image CDNs)
    #[builder(default)]
    pub headers: Vec<(String, String)>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Per-request knobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Sleep before the request is sent, used to throttle page scraping
    pub delay: Duration,
    /// Serve from / store into the shared cache (safe verbs only)
    pub cacheable: bool,
}

impl FetchOptions {
    pub fn cached() -> Self {
        Self {
            delay: Duration::ZERO,
            cacheable: true,
        }
    }

    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay,
            cacheable: false,
        }
    }
}

enum Failure {
    Status(Response),
    Transport(reqwest::Error),
}

/// Policy-driven HTTP client
///
/// Cheap to clone: the underlying connection pool, the retry handlers and the
/// cache are all shared.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    policy: RetryPolicy,
    cache: Option<Arc<HttpCache>>,
    negotiation: Vec<(String, String)>,
}

impl HttpClient {
    /// Create a new HTTP client with the default (fail fast) retry policy
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut negotiation = Vec::new();

        for (name, value) in &config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::InvalidConfig(format!("header {name}: {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| FetchError::InvalidConfig(format!("header {name}: {e}")))?;

            if NEGOTIATION_HEADERS.contains(&header_name.as_str()) {
                negotiation.push((header_name.as_str().to_string(), value.clone()));
            }
            headers.insert(header_name, header_value);
        }
        negotiation.sort();

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            policy: RetryPolicy::default(),
            cache: None,
            negotiation,
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cache(mut self, cache: Arc<HttpCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Perform one logical request, retrying as the policy dictates
    pub async fn fetch(&self, method: Method, url: &str, options: FetchOptions) -> Result<Bytes> {
        let cache = match (&self.cache, options.cacheable && method.is_safe()) {
            (Some(cache), true) => Some((cache, self.cache_key(&method, url))),
            _ => None,
        };

        if let Some((cache, key)) = &cache {
            if let Some(body) = cache.get(key) {
                debug!(url, "Served from cache");
                return Ok(body);
            }
        }

        if !options.delay.is_zero() {
            tokio::time::sleep(options.delay).await;
        }

        let body = self.send_with_policy(&method, url).await?;

        if let Some((cache, key)) = cache {
            cache.insert(key, body.clone());
        }

        Ok(body)
    }

    /// GET a binary resource, never cached
    pub async fn get_bytes(&self, url: &str, delay: Duration) -> Result<Bytes> {
        self.fetch(Method::GET, url, FetchOptions::delayed(delay)).await
    }

    /// GET and decode a JSON document
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, options: FetchOptions) -> Result<T> {
        let body = self.fetch(Method::GET, url, options).await?;
        decode_json(url, &body)
    }

    async fn send_with_policy(&self, method: &Method, url: &str) -> Result<Bytes> {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let wait = match self.send_once(method, url).await {
                Ok(body) => {
                    if attempts > 1 {
                        debug!(url, attempts, "Request succeeded after retry");
                    }
                    return Ok(body);
                }
                Err(Failure::Status(response)) => {
                    let status = response.status();
                    match self.policy.status_verdict(&response, attempts) {
                        Some(wait) => {
                            warn!(url, attempts, status = status.as_u16(), ?wait, "Request failed, retrying");
                            wait
                        }
                        None => return Err(status_error(url, status)),
                    }
                }
                Err(Failure::Transport(err)) => match self.policy.connection_verdict(&err, attempts) {
                    Some(wait) => {
                        warn!(url, attempts, error = %err, ?wait, "Connection failed, retrying");
                        wait
                    }
                    None => {
                        warn!(url, attempts, error = %err, "Connection failed");
                        return Err(FetchError::Connection {
                            url: url.to_string(),
                            source: err,
                        });
                    }
                },
            };

            tokio::time::sleep(wait).await;
        }
    }

    async fn send_once(&self, method: &Method, url: &str) -> std::result::Result<Bytes, Failure> {
        debug!(url, %method, "Sending request");

        let response = self
            .client
            .request(method.clone(), url)
            .send()
            .await
            .map_err(Failure::Transport)?;

        if !response.status().is_success() {
            return Err(Failure::Status(response));
        }

        let bytes = response.bytes().await.map_err(Failure::Transport)?;
        debug!(url, size = bytes.len(), "Request completed");
        Ok(bytes)
    }

    fn cache_key(&self, method: &Method, url: &str) -> String {
        let mut key = format!("{method} {url}");
        for (name, value) in &self.negotiation {
            key.push_str(&format!("|{name}={value}"));
        }
        key
    }
}

fn status_error(url: &str, status: StatusCode) -> FetchError {
    if status == StatusCode::NOT_FOUND {
        return FetchError::NotFound {
            url: url.to_string(),
        };
    }
    FetchError::QueryFailed {
        url: url.to_string(),
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
    }
}

pub(crate) fn decode_json<T: DeserializeOwned>(url: &str, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| FetchError::InvalidResponse {
        url: url.to_string(),
        message: e.to_string(),
    })
}
