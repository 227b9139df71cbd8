//! Redis-backed cache client.
//!
//! Views are stored as JSON arrays under their derived key with a per-entry
//! expiry. Each view key has a companion version key under
//! [`VERSION_PREFIX`]; deletes bump it in the same transaction that drops the
//! view. A load records the version before reading the store and only stores
//! its result through a script that checks the version is unchanged, so a
//! load that raced a delete never writes its stale list back, even when the
//! delete came from another process.
//!
//! Loads are serialized per key within this process; several processes
//! sharing one Redis may each run a load for the same key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use tracing::{debug, warn};

use crate::cache::store::{METRIC_CACHE_HIT, METRIC_CACHE_LOAD_MS, METRIC_CACHE_MISS};
use crate::cache::{CacheClient, CacheError, InflightLoads, Loader};

/// Prefix of the per-view version keys. View keys never start with it.
pub const VERSION_PREFIX: &str = "VIEW_VERSION:";

/// Version keys only need to outlive the loads that read them.
const VERSION_TTL_SECS: i64 = 60 * 60 * 24 * 7;

// KEYS[1] view, KEYS[2] version; ARGV[1] expected version ('' when absent),
// ARGV[2] payload, ARGV[3] ttl seconds.
const FILL_SCRIPT: &str = r"
local current = redis.call('GET', KEYS[2])
if (current or '') ~= ARGV[1] then
    return 0
end
redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
return 1
";

pub fn version_key(key: &str) -> String {
    format!("{VERSION_PREFIX}{key}")
}

pub struct RedisCacheClient {
    conn: ConnectionManager,
    inflight: InflightLoads,
    fill_script: Script,
}

impl RedisCacheClient {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            inflight: InflightLoads::new(),
            fill_script: Script::new(FILL_SCRIPT),
        }
    }

    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(CacheError::unavailable)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(CacheError::unavailable)?;
        Ok(Self::new(conn))
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<String>>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await.map_err(CacheError::unavailable)?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        match decode(key, &raw) {
            Ok(user_ids) => Ok(Some(user_ids)),
            Err(err) => {
                // Overwritten by the reload that follows.
                warn!(error = %err, "discarding undecodable cached view");
                Ok(None)
            }
        }
    }

    async fn version(&self, key: &str) -> Result<String, CacheError> {
        let mut conn = self.conn.clone();
        let version: Option<String> = conn
            .get(version_key(key))
            .await
            .map_err(CacheError::unavailable)?;
        Ok(version.unwrap_or_default())
    }

    /// Store `user_ids` unless the view was deleted since `version` was read.
    async fn fill(
        &self,
        key: &str,
        version: &str,
        user_ids: &[String],
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let seconds = ttl.as_secs();
        if seconds == 0 {
            return Ok(false);
        }
        let payload = serde_json::to_string(user_ids).map_err(|err| CacheError::Codec {
            key: key.to_string(),
            message: err.to_string(),
        })?;

        let mut conn = self.conn.clone();
        let stored: i64 = self
            .fill_script
            .key(key)
            .key(version_key(key))
            .arg(version)
            .arg(payload)
            .arg(seconds)
            .invoke_async(&mut conn)
            .await
            .map_err(CacheError::unavailable)?;
        Ok(stored == 1)
    }
}

fn decode(key: &str, raw: &str) -> Result<Vec<String>, CacheError> {
    serde_json::from_str(raw).map_err(|err| CacheError::Codec {
        key: key.to_string(),
        message: err.to_string(),
    })
}

#[async_trait]
impl CacheClient for RedisCacheClient {
    async fn get_or_load(
        &self,
        key: &str,
        ttl: Duration,
        loader: Loader<'_>,
    ) -> Result<Vec<String>, CacheError> {
        if let Some(user_ids) = self.read(key).await? {
            counter!(METRIC_CACHE_HIT).increment(1);
            return Ok(user_ids);
        }

        let _inflight = self.inflight.acquire(key).await;
        let version = self.version(key).await?;
        if let Some(user_ids) = self.read(key).await? {
            counter!(METRIC_CACHE_HIT).increment(1);
            return Ok(user_ids);
        }

        counter!(METRIC_CACHE_MISS).increment(1);
        let started_at = Instant::now();
        let user_ids = loader.await?;
        histogram!(METRIC_CACHE_LOAD_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        if !self.fill(key, &version, &user_ids, ttl).await? {
            debug!(key, "view invalidated during load; result not cached");
        }
        Ok(user_ids)
    }

    async fn batch_delete(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in keys {
            let version = version_key(key);
            pipe.del(key)
                .ignore()
                .incr(&version, 1)
                .ignore()
                .expire(&version, VERSION_TTL_SECS)
                .ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(CacheError::unavailable)?;
        debug!(keys = keys.len(), "redis batch delete");
        Ok(())
    }
}
