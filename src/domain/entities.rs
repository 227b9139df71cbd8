//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::types::RelationFlag;

/// One directed edge between two users.
///
/// `(owner_user_id, related_user_id)` is unique in the store. Timestamps are
/// optional so callers can hand unstamped rows to `create`; rows read back
/// from a store always carry both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RelationRecord {
    pub owner_user_id: String,
    pub related_user_id: String,
    pub is_blocked: bool,
    pub is_following: bool,
    pub is_subscribed: bool,
    pub created_at: Option<OffsetDateTime>,
    pub updated_at: Option<OffsetDateTime>,
}

impl RelationRecord {
    /// Unstamped record with every facet cleared.
    pub fn new(owner_user_id: impl Into<String>, related_user_id: impl Into<String>) -> Self {
        Self {
            owner_user_id: owner_user_id.into(),
            related_user_id: related_user_id.into(),
            is_blocked: false,
            is_following: false,
            is_subscribed: false,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_flag(mut self, flag: RelationFlag, value: bool) -> Self {
        match flag {
            RelationFlag::Blocked => self.is_blocked = value,
            RelationFlag::Following => self.is_following = value,
            RelationFlag::Subscribed => self.is_subscribed = value,
        }
        self
    }

    pub fn flag(&self, flag: RelationFlag) -> bool {
        match flag {
            RelationFlag::Blocked => self.is_blocked,
            RelationFlag::Following => self.is_following,
            RelationFlag::Subscribed => self.is_subscribed,
        }
    }

    /// Whether `related_user_id` belongs in the owner's follower list.
    pub fn counts_as_follower(&self) -> bool {
        self.is_following && !self.is_blocked
    }

    /// Whether `related_user_id` belongs in the owner's subscriber list.
    pub fn counts_as_subscriber(&self) -> bool {
        self.is_subscribed && !self.is_blocked
    }

    pub fn pair(&self) -> (&str, &str) {
        (&self.owner_user_id, &self.related_user_id)
    }

    /// Fill missing timestamps with `now`, leaving caller-supplied ones alone.
    pub fn stamp(&mut self, now: OffsetDateTime) {
        if self.created_at.is_none() {
            self.created_at = Some(now);
        }
        if self.updated_at.is_none() {
            self.updated_at = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn blocked_relation_never_counts() {
        let record = RelationRecord::new("u1", "u2")
            .with_flag(RelationFlag::Following, true)
            .with_flag(RelationFlag::Subscribed, true)
            .with_flag(RelationFlag::Blocked, true);

        assert!(!record.counts_as_follower());
        assert!(!record.counts_as_subscriber());

        let unblocked = record.with_flag(RelationFlag::Blocked, false);
        assert!(unblocked.counts_as_follower());
        assert!(unblocked.counts_as_subscriber());
    }

    #[test]
    fn stamp_keeps_supplied_timestamps() {
        let created = datetime!(2024-01-01 00:00 UTC);
        let now = datetime!(2024-06-01 12:00 UTC);

        let mut record = RelationRecord::new("u1", "u2");
        record.created_at = Some(created);
        record.stamp(now);

        assert_eq!(record.created_at, Some(created));
        assert_eq!(record.updated_at, Some(now));
    }
}
