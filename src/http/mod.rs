//! Outbound HTTP: policy-driven client, response cache, pagination

mod aggregate;
pub mod cache;
pub mod client;
pub mod policy;

pub use cache::{CacheStats, HttpCache};
pub use client::{FetchError, FetchOptions, HttpClient, HttpClientConfig, Result};
pub use policy::RetryPolicy;
