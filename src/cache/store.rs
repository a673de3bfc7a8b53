//! In-process store for rendered page fragments.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lru::LruCache;
use metrics::counter;
use tokio::time::Instant;
use tracing::debug;

use super::config::CacheConfig;
use super::keys::FragmentKey;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

pub const METRIC_PAGE_CACHE_HIT: &str = "yatube_page_cache_hit_total";
pub const METRIC_PAGE_CACHE_MISS: &str = "yatube_page_cache_miss_total";
pub const METRIC_PAGE_CACHE_EVICT: &str = "yatube_page_cache_evict_total";

#[derive(Clone)]
struct Entry {
    body: Arc<str>,
    expires_at: Instant,
}

/// TTL-bounded cache of rendered fragments.
///
/// Entries are never pushed out by writes elsewhere in the application: a
/// cached fragment is served until its ttl runs out or it is invalidated
/// explicitly. Expired entries count as misses and are dropped on access.
pub struct PageCache {
    config: CacheConfig,
    entries: Mutex<LruCache<FragmentKey, Entry>>,
}

impl PageCache {
    pub fn new(config: CacheConfig) -> Self {
        let entries = Mutex::new(LruCache::new(config.max_entries));
        Self { config, entries }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn get(&self, key: &FragmentKey) -> Option<String> {
        if !self.config.enabled {
            record_miss(key);
            return None;
        }

        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let lookup = entries
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.body.clone()));

        match lookup {
            Some(Some(body)) => {
                counter!(METRIC_PAGE_CACHE_HIT, "fragment" => key.kind()).increment(1);
                Some(body.to_string())
            }
            Some(None) => {
                entries.pop(key);
                record_miss(key);
                None
            }
            None => {
                record_miss(key);
                None
            }
        }
    }

    pub fn set(&self, key: FragmentKey, value: impl Into<Arc<str>>, ttl: Duration) {
        if !self.config.enabled {
            return;
        }

        let entry = Entry {
            body: value.into(),
            expires_at: Instant::now() + ttl,
        };
        let evicted = mutex_lock(&self.entries, SOURCE, "set").push(key, entry);
        if let Some((evicted_key, _)) = evicted
            && evicted_key != key
        {
            counter!(METRIC_PAGE_CACHE_EVICT, "fragment" => evicted_key.kind()).increment(1);
            debug!(target = "yatube::cache", key = %evicted_key, "evicted fragment");
        }
    }

    /// Restart the ttl of a live entry. Returns false when there is none.
    pub fn touch(&self, key: &FragmentKey, ttl: Duration) -> bool {
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "touch");
        match entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = now + ttl;
                true
            }
            _ => false,
        }
    }

    /// Drop `key` regardless of its remaining ttl.
    pub fn invalidate(&self, key: &FragmentKey) -> bool {
        let removed = mutex_lock(&self.entries, SOURCE, "invalidate")
            .pop(key)
            .is_some();
        debug!(target = "yatube::cache", key = %key, removed, "invalidate");
        removed
    }

    pub fn invalidate_all(&self) {
        mutex_lock(&self.entries, SOURCE, "invalidate_all").clear();
        debug!(target = "yatube::cache", "invalidate_all");
    }

    pub fn clear(&self) {
        self.invalidate_all();
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serve `key` from the cache, or run `render` and store its output for
    /// `ttl`. A failed render stores nothing.
    ///
    /// The lock is not held while rendering, so concurrent misses may both
    /// render; the last write wins.
    pub async fn get_or_render<F, Fut, E>(
        &self,
        key: FragmentKey,
        render: F,
        ttl: Duration,
    ) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let Some(body) = self.get(&key) {
            return Ok(body);
        }

        let body = render().await?;
        self.set(key, body.as_str(), ttl);
        Ok(body)
    }
}

fn record_miss(key: &FragmentKey) {
    counter!(METRIC_PAGE_CACHE_MISS, "fragment" => key.kind()).increment(1);
}
