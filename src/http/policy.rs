//! Retry policy: per-status handlers plus a single connection-error handler

use reqwest::Response;
use reqwest::header::RETRY_AFTER;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Decides whether a non-2xx response is retried; `None` gives up.
pub type StatusHandler = Arc<dyn Fn(&Response, u32) -> Option<Duration> + Send + Sync>;

/// Decides whether a transport failure is retried; `None` gives up.
pub type ConnectionHandler = Arc<dyn Fn(&reqwest::Error, u32) -> Option<Duration> + Send + Sync>;

/// Table of retry handlers consulted by [`HttpClient`](super::HttpClient)
///
/// The attempt number handed to a handler starts at 1 for the first request.
/// An empty policy fails immediately on every error.
#[derive(Clone, Default)]
pub struct RetryPolicy {
    status: BTreeMap<u16, StatusHandler>,
    connection: Option<ConnectionHandler>,
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_status<F>(mut self, code: u16, handler: F) -> Self
    where
        F: Fn(&Response, u32) -> Option<Duration> + Send + Sync + 'static,
    {
        self.status.insert(code, Arc::new(handler));
        self
    }

    /// Register the same handler for several status codes
    pub fn on_statuses<F>(mut self, codes: impl IntoIterator<Item = u16>, handler: F) -> Self
    where
        F: Fn(&Response, u32) -> Option<Duration> + Send + Sync + 'static,
    {
        let handler: StatusHandler = Arc::new(handler);
        for code in codes {
            self.status.insert(code, Arc::clone(&handler));
        }
        self
    }

    pub fn on_connection_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&reqwest::Error, u32) -> Option<Duration> + Send + Sync + 'static,
    {
        self.connection = Some(Arc::new(handler));
        self
    }

    pub fn handles_status(&self, code: u16) -> bool {
        self.status.contains_key(&code)
    }

    pub(crate) fn status_verdict(&self, response: &Response, attempt: u32) -> Option<Duration> {
        self.status
            .get(&response.status().as_u16())
            .and_then(|handler| handler(response, attempt))
    }

    pub(crate) fn connection_verdict(&self, error: &reqwest::Error, attempt: u32) -> Option<Duration> {
        self.connection.as_ref().and_then(|handler| handler(error, attempt))
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("status", &self.status.keys().collect::<Vec<_>>())
            .field("connection", &self.connection.is_some())
            .finish()
    }
}

/// Exponential backoff: base, 2*base, 4*base... for at most `max_attempts` requests
pub fn exponential(attempt: u32, max_attempts: u32, base: Duration) -> Option<Duration> {
    if attempt >= max_attempts {
        return None;
    }
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    Some(base.saturating_mul(factor))
}

/// Status handler retrying with exponential backoff
pub fn backoff(max_attempts: u32, base: Duration) -> impl Fn(&Response, u32) -> Option<Duration> + Send + Sync + 'static {
    move |_, attempt| exponential(attempt, max_attempts, base)
}

/// Connection handler retrying with exponential backoff
pub fn connection_backoff(
    max_attempts: u32,
    base: Duration,
) -> impl Fn(&reqwest::Error, u32) -> Option<Duration> + Send + Sync + 'static {
    move |_, attempt| exponential(attempt, max_attempts, base)
}

/// Status handler honouring a `Retry-After: <seconds>` header, falling back to
/// exponential backoff when the header is absent or not numeric
///
/// An advertised wait longer than `max_wait` is clamped to it.
pub fn retry_after(
    max_attempts: u32,
    fallback: Duration,
    max_wait: Duration,
) -> impl Fn(&Response, u32) -> Option<Duration> + Send + Sync + 'static {
    move |response, attempt| {
        let backoff = exponential(attempt, max_attempts, fallback)?;
        let advertised = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        Some(advertised.map_or(backoff, |wait| wait.min(max_wait)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_doubles_until_cap() {
        let base = Duration::from_millis(100);
        assert_eq!(exponential(1, 4, base), Some(Duration::from_millis(100)));
        assert_eq!(exponential(2, 4, base), Some(Duration::from_millis(200)));
        assert_eq!(exponential(3, 4, base), Some(Duration::from_millis(400)));
        assert_eq!(exponential(4, 4, base), None);
    }

    #[test]
    fn test_single_attempt_never_retries() {
        assert_eq!(exponential(1, 1, Duration::from_secs(1)), None);
    }

    #[test]
    fn test_policy_registration() {
        let policy = RetryPolicy::new()
            .on_statuses([500, 502, 503], backoff(3, Duration::from_millis(10)))
            .on_status(429, retry_after(3, Duration::from_millis(10), Duration::from_secs(1)));

        assert!(policy.handles_status(429));
        assert!(policy.handles_status(502));
        assert!(!policy.handles_status(404));

        let debug = format!("{policy:?}");
        assert!(debug.contains("connection: false"));
    }
}
