//! Read-through cache for the follower and subscriber views.
//!
//! Reads go through the cache client's `get_or_load`, with the store
//! projection as loader. Invalidation uses the chained accumulator: every
//! `del_*` call returns a new [`RelationCache`] carrying one more pending key,
//! and [`RelationCache::exec_del`] flushes them as one batch.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::instrument;

use crate::application::context::OpContext;
use crate::application::repos::RelationsRepo;

use super::batch::BatchDeleter;
use super::client::{CacheClient, CacheError};
use super::config::CacheConfig;
use super::keys::ViewKind;

pub struct RelationCache {
    deleter: BatchDeleter,
    follower_ttl: Duration,
    subscriber_ttl: Duration,
    repo: Arc<dyn RelationsRepo>,
}

impl RelationCache {
    pub fn new(
        client: Arc<dyn CacheClient>,
        repo: Arc<dyn RelationsRepo>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            deleter: BatchDeleter::new(client),
            follower_ttl: config.follower_ttl(),
            subscriber_ttl: config.subscriber_ttl(),
            repo,
        }
    }

    /// Independent accumulator over the same client and store, with nothing pending.
    pub fn clone_cache(&self) -> Self {
        self.with_deleter(self.deleter.fresh())
    }

    #[must_use = "the returned cache carries the pending invalidation"]
    pub fn del_follower_user_ids(&self, owner_user_id: &str) -> Self {
        self.del_view(ViewKind::Followers, owner_user_id)
    }

    #[must_use = "the returned cache carries the pending invalidation"]
    pub fn del_subscriber_user_ids(&self, owner_user_id: &str) -> Self {
        self.del_view(ViewKind::Subscribers, owner_user_id)
    }

    pub fn pending_keys(&self) -> &[String] {
        self.deleter.keys()
    }

    /// Flush every pending key as one batch delete and drop the accumulator.
    pub async fn exec_del(self, ctx: &OpContext) -> Result<(), CacheError> {
        self.deleter.exec_del(ctx).await
    }

    pub async fn get_follower_user_ids(
        &self,
        ctx: &OpContext,
        owner_user_id: &str,
    ) -> Result<Vec<String>, CacheError> {
        self.get_view(ctx, ViewKind::Followers, owner_user_id).await
    }

    pub async fn get_subscriber_user_ids(
        &self,
        ctx: &OpContext,
        owner_user_id: &str,
    ) -> Result<Vec<String>, CacheError> {
        self.get_view(ctx, ViewKind::Subscribers, owner_user_id).await
    }

    pub fn ttl(&self, view: ViewKind) -> Duration {
        match view {
            ViewKind::Followers => self.follower_ttl,
            ViewKind::Subscribers => self.subscriber_ttl,
        }
    }

    #[instrument(skip(self, ctx), fields(view = %view))]
    async fn get_view(
        &self,
        ctx: &OpContext,
        view: ViewKind,
        owner_user_id: &str,
    ) -> Result<Vec<String>, CacheError> {
        let key = view.key_for(owner_user_id);
        let repo = &self.repo;
        let loader = async move {
            match view {
                ViewKind::Followers => ctx.run(repo.follower_user_ids(owner_user_id)).await,
                ViewKind::Subscribers => ctx.run(repo.subscriber_user_ids(owner_user_id)).await,
            }
        }
        .boxed();

        ctx.run(
            self.deleter
                .client()
                .get_or_load(&key, self.ttl(view), loader),
        )
        .await
    }

    fn del_view(&self, view: ViewKind, owner_user_id: &str) -> Self {
        self.with_deleter(self.deleter.with_keys([view.key_for(owner_user_id)]))
    }

    fn with_deleter(&self, deleter: BatchDeleter) -> Self {
        Self {
            deleter,
            follower_ttl: self.follower_ttl,
            subscriber_ttl: self.subscriber_ttl,
            repo: Arc::clone(&self.repo),
        }
    }
}
