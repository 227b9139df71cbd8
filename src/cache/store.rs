//! In-process cache backend.
//!
//! Entries live in an LRU bounded by [`CacheConfig::memory_capacity`] and carry
//! their own deadline. Expired entries count as misses and are dropped when
//! touched. Deadlines use `tokio::time::Instant` so paused-clock tests can step
//! over them.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use metrics::{counter, histogram};
use tokio::time::Instant;
use tracing::debug;

use super::client::{CacheClient, CacheError, Loader};
use super::config::CacheConfig;
use super::inflight::InflightLoads;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_CACHE_HIT: &str = "relcache_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "relcache_cache_miss_total";
pub(crate) const METRIC_CACHE_EVICT: &str = "relcache_cache_evict_total";
pub(crate) const METRIC_CACHE_LOAD_MS: &str = "relcache_cache_load_ms";

#[derive(Clone)]
struct CachedIds {
    user_ids: Vec<String>,
    expires_at: Instant,
}

/// [`CacheClient`] keeping user-id lists in process memory.
///
/// Loads are deduplicated per key within the process.
pub struct MemoryCacheClient {
    entries: RwLock<LruCache<String, CachedIds>>,
    inflight: InflightLoads,
}

impl MemoryCacheClient {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.memory_capacity_non_zero())),
            inflight: InflightLoads::new(),
        }
    }

    /// Live value under `key`, if any.
    pub fn peek(&self, key: &str) -> Option<Vec<String>> {
        let mut entries = rw_write(&self.entries, SOURCE, "peek");
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.user_ids.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: &str, user_ids: Vec<String>, ttl: Duration) {
        let mut entries = rw_write(&self.entries, SOURCE, "insert");
        push_entry(&mut entries, key, user_ids, ttl);
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn push_entry(
    entries: &mut LruCache<String, CachedIds>,
    key: &str,
    user_ids: Vec<String>,
    ttl: Duration,
) {
    if ttl.is_zero() {
        return;
    }
    let entry = CachedIds {
        user_ids,
        expires_at: Instant::now() + ttl,
    };
    if let Some((evicted_key, _)) = entries.push(key.to_string(), entry) {
        // `push` also hands back the old value when the key was replaced.
        if evicted_key != key {
            counter!(METRIC_CACHE_EVICT).increment(1);
            debug!(key = %evicted_key, "evicted cached view");
        }
    }
}

#[async_trait]
impl CacheClient for MemoryCacheClient {
    async fn get_or_load(
        &self,
        key: &str,
        ttl: Duration,
        loader: Loader<'_>,
    ) -> Result<Vec<String>, CacheError> {
        if let Some(user_ids) = self.peek(key) {
            counter!(METRIC_CACHE_HIT).increment(1);
            return Ok(user_ids);
        }

        let inflight = self.inflight.acquire(key).await;
        // Another caller may have filled the key while we waited.
        if let Some(user_ids) = self.peek(key) {
            counter!(METRIC_CACHE_HIT).increment(1);
            return Ok(user_ids);
        }

        counter!(METRIC_CACHE_MISS).increment(1);
        let started_at = std::time::Instant::now();
        let user_ids = loader.await?;
        histogram!(METRIC_CACHE_LOAD_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        {
            // Checked under the entries lock so a concurrent delete either
            // lands first and is seen here, or removes what we store.
            let mut entries = rw_write(&self.entries, SOURCE, "fill");
            if inflight.is_current() {
                push_entry(&mut entries, key, user_ids.clone(), ttl);
            } else {
                debug!(key, "view invalidated during load; result not cached");
            }
        }
        Ok(user_ids)
    }

    async fn batch_delete(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut entries = rw_write(&self.entries, SOURCE, "batch_delete");
        for key in keys {
            self.inflight.invalidate(key);
            entries.pop(key);
        }
        Ok(())
    }
}
