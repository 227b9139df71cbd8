//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::context::Canceled;
use crate::domain::entities::RelationRecord;
use crate::domain::types::RelationFlag;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
    #[error("operation canceled")]
    Canceled,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<Canceled> for RepoError {
    fn from(_: Canceled) -> Self {
        RepoError::Canceled
    }
}

/// Field set applied by [`RelationsRepo::update_by_patch`].
///
/// Unset flags are left untouched. `updated_at` defaults to the time the store
/// applies the patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationPatch {
    pub is_blocked: Option<bool>,
    pub is_following: Option<bool>,
    pub is_subscribed: Option<bool>,
    pub updated_at: Option<OffsetDateTime>,
}

impl RelationPatch {
    /// Patch touching exactly one facet.
    pub fn flag(flag: RelationFlag, value: bool) -> Self {
        Self::default().with_flag(flag, value)
    }

    pub fn with_flag(mut self, flag: RelationFlag, value: bool) -> Self {
        match flag {
            RelationFlag::Blocked => self.is_blocked = Some(value),
            RelationFlag::Following => self.is_following = Some(value),
            RelationFlag::Subscribed => self.is_subscribed = Some(value),
        }
        self
    }

    pub fn with_updated_at(mut self, updated_at: OffsetDateTime) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Flags carried by this patch, in column order.
    pub fn flags(&self) -> impl Iterator<Item = (RelationFlag, bool)> + '_ {
        RelationFlag::ALL.into_iter().filter_map(|flag| {
            let value = match flag {
                RelationFlag::Blocked => self.is_blocked,
                RelationFlag::Following => self.is_following,
                RelationFlag::Subscribed => self.is_subscribed,
            };
            value.map(|value| (flag, value))
        })
    }

    /// Apply the patch to an in-memory row, stamping `updated_at`.
    pub fn apply_to(&self, record: &mut RelationRecord, now: OffsetDateTime) {
        for (flag, value) in self.flags() {
            match flag {
                RelationFlag::Blocked => record.is_blocked = value,
                RelationFlag::Following => record.is_following = value,
                RelationFlag::Subscribed => record.is_subscribed = value,
            }
        }
        record.updated_at = Some(self.updated_at.unwrap_or(now));
    }
}

/// Persistent store of relation rows plus the two filtered projections the
/// cache layer derives its views from.
#[async_trait]
pub trait RelationsRepo: Send + Sync {
    /// Insert every record in one batch. Missing timestamps are stamped with
    /// the current time. A pair that already exists fails the whole batch with
    /// [`RepoError::Duplicate`].
    async fn create(&self, relations: &[RelationRecord]) -> Result<(), RepoError>;

    /// Delete rows matching any of the given `(owner, related)` pairs.
    /// Empty input is a no-op.
    async fn delete(&self, relations: &[RelationRecord]) -> Result<(), RepoError>;

    async fn take(
        &self,
        owner_user_id: &str,
        related_user_id: &str,
    ) -> Result<RelationRecord, RepoError>;

    /// Fails with [`RepoError::NotFound`] when no row matches the pair.
    async fn update_by_patch(
        &self,
        owner_user_id: &str,
        related_user_id: &str,
        patch: &RelationPatch,
    ) -> Result<(), RepoError>;

    /// Related ids with `is_following` set and `is_blocked` clear.
    async fn follower_user_ids(&self, owner_user_id: &str) -> Result<Vec<String>, RepoError>;

    /// Related ids with `is_subscribed` set and `is_blocked` clear.
    async fn subscriber_user_ids(&self, owner_user_id: &str) -> Result<Vec<String>, RepoError>;
}
