//! Relation reads and writes with cache invalidation.
//!
//! Every write persists first and only then invalidates. For each affected
//! owner both the follower and the subscriber view are dropped, whichever flag
//! changed. A failed invalidation is reported to the caller but the committed
//! write stays; the view TTL bounds how long a stale entry can survive.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::application::context::OpContext;
use crate::application::error::RelationError;
use crate::application::repos::{RelationPatch, RelationsRepo};
use crate::cache::RelationCache;
use crate::domain::entities::RelationRecord;
use crate::domain::types::RelationFlag;

pub struct RelationService {
    repo: Arc<dyn RelationsRepo>,
    cache: RelationCache,
}

impl RelationService {
    pub fn new(repo: Arc<dyn RelationsRepo>, cache: RelationCache) -> Self {
        Self { repo, cache }
    }

    pub fn cache(&self) -> &RelationCache {
        &self.cache
    }

    #[instrument(skip_all, fields(count = relations.len()))]
    pub async fn create(
        &self,
        ctx: &OpContext,
        relations: &[RelationRecord],
    ) -> Result<(), RelationError> {
        if relations.is_empty() {
            return Ok(());
        }
        ctx.run(self.repo.create(relations)).await?;
        self.invalidate_owners(ctx, &owners_of(relations)).await
    }

    #[instrument(skip_all, fields(count = relations.len()))]
    pub async fn delete(
        &self,
        ctx: &OpContext,
        relations: &[RelationRecord],
    ) -> Result<(), RelationError> {
        if relations.is_empty() {
            return Ok(());
        }
        ctx.run(self.repo.delete(relations)).await?;
        self.invalidate_owners(ctx, &owners_of(relations)).await
    }

    pub async fn block_user(
        &self,
        ctx: &OpContext,
        owner_user_id: &str,
        block_user_id: &str,
    ) -> Result<(), RelationError> {
        self.set_flag(ctx, owner_user_id, block_user_id, RelationFlag::Blocked, true)
            .await
    }

    pub async fn unblock_user(
        &self,
        ctx: &OpContext,
        owner_user_id: &str,
        block_user_id: &str,
    ) -> Result<(), RelationError> {
        self.set_flag(ctx, owner_user_id, block_user_id, RelationFlag::Blocked, false)
            .await
    }

    pub async fn follow_user(
        &self,
        ctx: &OpContext,
        owner_user_id: &str,
        related_user_id: &str,
    ) -> Result<(), RelationError> {
        self.set_flag(ctx, owner_user_id, related_user_id, RelationFlag::Following, true)
            .await
    }

    pub async fn unfollow_user(
        &self,
        ctx: &OpContext,
        owner_user_id: &str,
        related_user_id: &str,
    ) -> Result<(), RelationError> {
        self.set_flag(ctx, owner_user_id, related_user_id, RelationFlag::Following, false)
            .await
    }

    pub async fn subscribe_user(
        &self,
        ctx: &OpContext,
        owner_user_id: &str,
        related_user_id: &str,
    ) -> Result<(), RelationError> {
        self.set_flag(ctx, owner_user_id, related_user_id, RelationFlag::Subscribed, true)
            .await
    }

    pub async fn unsubscribe_user(
        &self,
        ctx: &OpContext,
        owner_user_id: &str,
        related_user_id: &str,
    ) -> Result<(), RelationError> {
        self.set_flag(ctx, owner_user_id, related_user_id, RelationFlag::Subscribed, false)
            .await
    }

    pub async fn get_follower_user_ids(
        &self,
        ctx: &OpContext,
        owner_user_id: &str,
    ) -> Result<Vec<String>, RelationError> {
        Ok(self.cache.get_follower_user_ids(ctx, owner_user_id).await?)
    }

    pub async fn get_subscriber_user_ids(
        &self,
        ctx: &OpContext,
        owner_user_id: &str,
    ) -> Result<Vec<String>, RelationError> {
        Ok(self.cache.get_subscriber_user_ids(ctx, owner_user_id).await?)
    }

    /// Uncached single-row lookup.
    #[instrument(skip(self, ctx))]
    pub async fn take(
        &self,
        ctx: &OpContext,
        owner_user_id: &str,
        related_user_id: &str,
    ) -> Result<RelationRecord, RelationError> {
        Ok(ctx
            .run(self.repo.take(owner_user_id, related_user_id))
            .await?)
    }

    #[instrument(skip(self, ctx), fields(flag = %flag))]
    async fn set_flag(
        &self,
        ctx: &OpContext,
        owner_user_id: &str,
        related_user_id: &str,
        flag: RelationFlag,
        value: bool,
    ) -> Result<(), RelationError> {
        let patch = RelationPatch::flag(flag, value);
        ctx.run(
            self.repo
                .update_by_patch(owner_user_id, related_user_id, &patch),
        )
        .await?;
        self.invalidate_owners(ctx, &[owner_user_id]).await
    }

    async fn invalidate_owners(
        &self,
        ctx: &OpContext,
        owners: &[&str],
    ) -> Result<(), RelationError> {
        let mut cache = self.cache.clone_cache();
        for owner in owners {
            cache = cache
                .del_follower_user_ids(owner)
                .del_subscriber_user_ids(owner);
        }

        let keys = cache.pending_keys().len();
        match cache.exec_del(ctx).await {
            Ok(()) => {
                debug!(owners = owners.len(), keys, "invalidated relation views");
                Ok(())
            }
            Err(err) => {
                warn!(
                    error = %err,
                    owners = owners.len(),
                    keys,
                    "relation write committed but cache invalidation failed"
                );
                Err(err.into())
            }
        }
    }
}

/// Distinct owners in first-seen order.
fn owners_of(relations: &[RelationRecord]) -> Vec<&str> {
    let mut owners: Vec<&str> = Vec::with_capacity(relations.len());
    for relation in relations {
        let owner = relation.owner_user_id.as_str();
        if !owners.contains(&owner) {
            owners.push(owner);
        }
    }
    owners
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owners_are_distinct_in_first_seen_order() {
        let relations = [
            RelationRecord::new("b", "x"),
            RelationRecord::new("a", "x"),
            RelationRecord::new("b", "y"),
            RelationRecord::new("c", "x"),
        ];
        assert_eq!(owners_of(&relations), vec!["b", "a", "c"]);
    }
}
