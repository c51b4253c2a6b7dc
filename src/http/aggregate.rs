use bytes::Bytes;
use reqwest::Method;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::client::{FetchError, FetchOptions, HttpClient, Result};

impl HttpClient {
    /// Walk a paginated resource, folding every page into one result
    ///
    /// `step` receives each body together with the accumulator and the caller's
    /// state and returns the updated accumulator plus the next URL to follow.
    /// Revisiting a URL fails with [`FetchError::AggregationLoop`].
    pub async fn aggregate<A, S, F>(
        &self,
        start: &str,
        options: FetchOptions,
        init: A,
        state: &mut S,
        mut step: F,
    ) -> Result<A>
    where
        F: FnMut(Bytes, A, &mut S) -> Result<(A, Option<String>)>,
    {
        let mut visited = HashSet::new();
        let mut acc = init;
        let mut next = Some(start.to_string());

        while let Some(url) = next {
            if !visited.insert(url.clone()) {
                warn!(url = %url, pages = visited.len(), "Pagination loop detected");
                return Err(FetchError::AggregationLoop { url });
            }

            let body = self.fetch(Method::GET, &url, options).await?;
            let (updated, following) = step(body, acc, state)?;
            acc = updated;
            next = following;
        }

        debug!(start, pages = visited.len(), "Aggregation finished");
        Ok(acc)
    }
}
