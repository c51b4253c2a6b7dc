//! Bounded, time-limited memo of completed HTTP reads

use bytes::Bytes;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

pub const MIN_MAXLEN: usize = 50;
pub const MIN_THRESHOLD: Duration = Duration::from_secs(60);

struct CacheEntry {
    payload: Bytes,
    created: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Keys from least to most recently touched
    order: VecDeque<String>,
}

impl CacheState {
    fn detach(&mut self, key: &str) {
        if let Some(position) = self.order.iter().position(|k| k == key) {
            self.order.remove(position);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Shared response cache
///
/// Entries are valid while `now - created < threshold`. A hit moves the key to
/// the back of the eviction queue; inserting into a full cache drops the key at
/// the front.
pub struct HttpCache {
    maxlen: usize,
    threshold: Duration,
    state: Mutex<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl HttpCache {
    pub fn new(maxlen: usize, threshold: Duration) -> Self {
        Self {
            maxlen,
            threshold,
            state: Mutex::new(CacheState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn maxlen(&self) -> usize {
        self.maxlen
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        let mut state = self.lock();

        let fresh = match state.entries.get(key) {
            Some(entry) => entry.created.elapsed() < self.threshold,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        state.detach(key);

        if !fresh {
            state.entries.remove(key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(key, "Dropped expired cache entry");
            return None;
        }

        state.order.push_back(key.to_string());
        self.hits.fetch_add(1, Ordering::Relaxed);
        state.entries.get(key).map(|entry| entry.payload.clone())
    }

    /// Insert or replace `key`
    pub fn insert(&self, key: String, payload: Bytes) {
        if self.maxlen == 0 {
            return;
        }

        let mut state = self.lock();

        if state.entries.contains_key(&key) {
            state.detach(&key);
        } else if state.entries.len() >= self.maxlen {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
                debug!(key = %oldest, "Evicted cache entry");
            }
        }

        state.entries.insert(
            key.clone(),
            CacheEntry {
                payload,
                created: Instant::now(),
            },
        );
        state.order.push_back(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for HttpCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCache")
            .field("maxlen", &self.maxlen)
            .field("threshold", &self.threshold)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Default for HttpCache {
    fn default() -> Self {
        Self::new(MIN_MAXLEN, MIN_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let cache = HttpCache::new(3, Duration::from_secs(60));
        for i in 0..4 {
            cache.insert(format!("k{i}"), body("x"));
        }

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("k0"));
        assert!(cache.contains("k1"));
        assert!(cache.contains("k3"));
    }

    #[test]
    fn test_hit_moves_key_to_back() {
        let cache = HttpCache::new(2, Duration::from_secs(60));
        cache.insert("a".to_string(), body("1"));
        cache.insert("b".to_string(), body("2"));

        assert_eq!(cache.get("a"), Some(body("1")));
        cache.insert("c".to_string(), body("3"));

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
    }

    #[test]
    fn test_expired_entry_never_returned() {
        let cache = HttpCache::new(10, Duration::from_millis(20));
        cache.insert("a".to_string(), body("1"));
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reinsert_replaces_payload() {
        let cache = HttpCache::new(2, Duration::from_secs(60));
        cache.insert("a".to_string(), body("old"));
        cache.insert("a".to_string(), body("new"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some(body("new")));
    }

    #[test]
    fn test_stats_count_hits_and_misses() {
        let cache = HttpCache::default();
        cache.insert("a".to_string(), body("1"));
        cache.get("a");
        cache.get("a");
        cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }
}
