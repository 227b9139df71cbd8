//! Chainable batch deletion.
//!
//! A [`BatchDeleter`] is a plain value: adding keys returns a new deleter and
//! leaves the receiver untouched, and [`BatchDeleter::exec_del`] consumes it.
//! One deleter belongs to one logical write.

use std::sync::Arc;

use metrics::counter;
use tracing::debug;

use crate::application::context::OpContext;

use super::client::{CacheClient, CacheError};

pub(crate) const METRIC_CACHE_INVALIDATED_KEYS: &str = "relcache_cache_invalidated_keys_total";

#[derive(Clone)]
pub struct BatchDeleter {
    client: Arc<dyn CacheClient>,
    keys: Vec<String>,
}

impl BatchDeleter {
    pub fn new(client: Arc<dyn CacheClient>) -> Self {
        Self {
            client,
            keys: Vec::new(),
        }
    }

    /// Deleter sharing the same client with nothing pending.
    pub fn fresh(&self) -> Self {
        Self::new(Arc::clone(&self.client))
    }

    /// Copy of `self` with `keys` appended. Keys already pending are skipped,
    /// so the batch keeps first-seen order without duplicates.
    pub fn with_keys<I>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut next = self.clone();
        for key in keys {
            if !next.keys.contains(&key) {
                next.keys.push(key);
            }
        }
        next
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn client(&self) -> &Arc<dyn CacheClient> {
        &self.client
    }

    /// Delete every pending key in one batch. An empty batch makes no call.
    pub async fn exec_del(self, ctx: &OpContext) -> Result<(), CacheError> {
        if self.keys.is_empty() {
            return Ok(());
        }

        ctx.run(self.client.batch_delete(&self.keys)).await?;
        counter!(METRIC_CACHE_INVALIDATED_KEYS).increment(self.keys.len() as u64);
        debug!(keys = ?self.keys, "invalidated cache keys");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::cache::client::Loader;

    #[derive(Default)]
    struct RecordingClient {
        batches: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl CacheClient for RecordingClient {
        async fn get_or_load(
            &self,
            _key: &str,
            _ttl: Duration,
            loader: Loader<'_>,
        ) -> Result<Vec<String>, CacheError> {
            Ok(loader.await?)
        }

        async fn batch_delete(&self, keys: &[String]) -> Result<(), CacheError> {
            self.batches.lock().unwrap().push(keys.to_vec());
            Ok(())
        }
    }

    #[test]
    fn with_keys_leaves_receiver_untouched() {
        let client = Arc::new(RecordingClient::default());
        let empty = BatchDeleter::new(client);
        let one = empty.with_keys(["a".to_string()]);
        let two = one.with_keys(["b".to_string(), "a".to_string()]);

        assert!(empty.keys().is_empty());
        assert_eq!(one.keys(), ["a"]);
        assert_eq!(two.keys(), ["a", "b"]);
        assert!(two.fresh().keys().is_empty());
    }

    #[tokio::test]
    async fn exec_del_sends_one_batch() {
        let client = Arc::new(RecordingClient::default());
        let deleter = BatchDeleter::new(client.clone())
            .with_keys(["a".to_string()])
            .with_keys(["b".to_string()]);

        deleter
            .exec_del(&OpContext::background())
            .await
            .expect("delete should succeed");

        assert_eq!(
            *client.batches.lock().unwrap(),
            vec![vec!["a".to_string(), "b".to_string()]]
        );
    }

    #[tokio::test]
    async fn empty_batch_makes_no_call() {
        let client = Arc::new(RecordingClient::default());
        BatchDeleter::new(client.clone())
            .exec_del(&OpContext::background())
            .await
            .expect("empty delete should succeed");

        assert!(client.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn canceled_context_skips_round_trip() {
        let client = Arc::new(RecordingClient::default());
        let ctx = OpContext::background();
        ctx.cancel();

        let err = BatchDeleter::new(client.clone())
            .with_keys(["a".to_string()])
            .exec_del(&ctx)
            .await
            .expect_err("canceled delete should fail");

        assert!(matches!(err, CacheError::Canceled));
        assert!(client.batches.lock().unwrap().is_empty());
    }
}
