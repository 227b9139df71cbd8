//! In-process relation store.
//!
//! Same contract as the Postgres adapter: unique `(owner, related)` pairs,
//! all-or-nothing batch inserts and projections ordered by related id. Used by
//! tests and by the CLI's `--store memory` mode.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{RelationPatch, RelationsRepo, RepoError};
use crate::cache::lock::{rw_read, rw_write};
use crate::domain::entities::RelationRecord;

const SOURCE: &str = "infra::memory";
const PAIR_CONSTRAINT: &str = "user_relations_owner_related_key";

type PairKey = (String, String);

#[derive(Default)]
pub struct InMemoryRelations {
    rows: RwLock<BTreeMap<PairKey, RelationRecord>>,
}

impl InMemoryRelations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row directly, replacing any row for the same pair.
    pub fn insert_unchecked(&self, mut record: RelationRecord) {
        record.stamp(OffsetDateTime::now_utc());
        let key = pair_key(&record);
        rw_write(&self.rows, SOURCE, "insert_unchecked").insert(key, record);
    }

    pub fn len(&self) -> usize {
        rw_read(&self.rows, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn project(&self, owner_user_id: &str, keep: fn(&RelationRecord) -> bool) -> Vec<String> {
        rw_read(&self.rows, SOURCE, "project")
            .values()
            .filter(|record| record.owner_user_id == owner_user_id && keep(record))
            .map(|record| record.related_user_id.clone())
            .collect()
    }
}

fn pair_key(record: &RelationRecord) -> PairKey {
    (
        record.owner_user_id.clone(),
        record.related_user_id.clone(),
    )
}

#[async_trait]
impl RelationsRepo for InMemoryRelations {
    async fn create(&self, relations: &[RelationRecord]) -> Result<(), RepoError> {
        let now = OffsetDateTime::now_utc();
        let mut rows = rw_write(&self.rows, SOURCE, "create");

        let mut staged: BTreeMap<PairKey, RelationRecord> = BTreeMap::new();
        for relation in relations {
            let key = pair_key(relation);
            if rows.contains_key(&key) || staged.contains_key(&key) {
                return Err(RepoError::Duplicate {
                    constraint: PAIR_CONSTRAINT.to_string(),
                });
            }
            let mut record = relation.clone();
            record.stamp(now);
            staged.insert(key, record);
        }

        rows.extend(staged);
        Ok(())
    }

    async fn delete(&self, relations: &[RelationRecord]) -> Result<(), RepoError> {
        if relations.is_empty() {
            return Ok(());
        }
        let mut rows = rw_write(&self.rows, SOURCE, "delete");
        for relation in relations {
            rows.remove(&pair_key(relation));
        }
        Ok(())
    }

    async fn take(
        &self,
        owner_user_id: &str,
        related_user_id: &str,
    ) -> Result<RelationRecord, RepoError> {
        rw_read(&self.rows, SOURCE, "take")
            .get(&(owner_user_id.to_string(), related_user_id.to_string()))
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn update_by_patch(
        &self,
        owner_user_id: &str,
        related_user_id: &str,
        patch: &RelationPatch,
    ) -> Result<(), RepoError> {
        let mut rows = rw_write(&self.rows, SOURCE, "update_by_patch");
        let record = rows
            .get_mut(&(owner_user_id.to_string(), related_user_id.to_string()))
            .ok_or(RepoError::NotFound)?;
        patch.apply_to(record, OffsetDateTime::now_utc());
        Ok(())
    }

    async fn follower_user_ids(&self, owner_user_id: &str) -> Result<Vec<String>, RepoError> {
        Ok(self.project(owner_user_id, RelationRecord::counts_as_follower))
    }

    async fn subscriber_user_ids(&self, owner_user_id: &str) -> Result<Vec<String>, RepoError> {
        Ok(self.project(owner_user_id, RelationRecord::counts_as_subscriber))
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::types::RelationFlag;

    #[tokio::test]
    async fn create_stamps_missing_timestamps_only() {
        let repo = InMemoryRelations::new();
        let created = datetime!(2020-05-05 05:05 UTC);
        let mut stamped = RelationRecord::new("u1", "u2");
        stamped.created_at = Some(created);
        stamped.updated_at = Some(created);

        repo.create(&[stamped, RelationRecord::new("u1", "u3")])
            .await
            .expect("create should succeed");

        let kept = repo.take("u1", "u2").await.expect("row exists");
        assert_eq!(kept.created_at, Some(created));
        assert_eq!(kept.updated_at, Some(created));

        let fresh = repo.take("u1", "u3").await.expect("row exists");
        assert!(fresh.created_at.is_some());
        assert!(fresh.updated_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_pair_rejects_whole_batch() {
        let repo = InMemoryRelations::new();
        repo.create(&[RelationRecord::new("u1", "u2")])
            .await
            .expect("first create");

        let err = repo
            .create(&[RelationRecord::new("u1", "u3"), RelationRecord::new("u1", "u2")])
            .await
            .expect_err("duplicate should fail");

        assert!(matches!(err, RepoError::Duplicate { .. }));
        assert!(matches!(
            repo.take("u1", "u3").await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn duplicate_inside_one_batch_is_rejected() {
        let repo = InMemoryRelations::new();
        let err = repo
            .create(&[RelationRecord::new("u1", "u2"), RelationRecord::new("u1", "u2")])
            .await
            .expect_err("duplicate should fail");
        assert!(matches!(err, RepoError::Duplicate { .. }));
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn patch_missing_pair_is_not_found() {
        let repo = InMemoryRelations::new();
        let err = repo
            .update_by_patch("u1", "u2", &RelationPatch::flag(RelationFlag::Blocked, true))
            .await
            .expect_err("missing row");
        assert!(matches!(err, RepoError::NotFound));
    }

    #[tokio::test]
    async fn projections_filter_blocked_and_sort() {
        let repo = InMemoryRelations::new();
        repo.create(&[
            RelationRecord::new("u1", "u9").with_flag(RelationFlag::Following, true),
            RelationRecord::new("u1", "u3")
                .with_flag(RelationFlag::Following, true)
                .with_flag(RelationFlag::Subscribed, true),
            RelationRecord::new("u1", "u4")
                .with_flag(RelationFlag::Subscribed, true)
                .with_flag(RelationFlag::Blocked, true),
            RelationRecord::new("u2", "u5").with_flag(RelationFlag::Following, true),
        ])
        .await
        .expect("create");

        assert_eq!(
            repo.follower_user_ids("u1").await.unwrap(),
            vec!["u3".to_string(), "u9".to_string()]
        );
        assert_eq!(
            repo.subscriber_user_ids("u1").await.unwrap(),
            vec!["u3".to_string()]
        );
        assert!(repo.follower_user_ids("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_exact_pairs() {
        let repo = InMemoryRelations::new();
        repo.create(&[
            RelationRecord::new("u1", "u2"),
            RelationRecord::new("u2", "u1"),
        ])
        .await
        .expect("create");

        repo.delete(&[RelationRecord::new("u1", "u2")])
            .await
            .expect("delete");
        repo.delete(&[]).await.expect("empty delete");

        assert!(repo.take("u1", "u2").await.is_err());
        assert!(repo.take("u2", "u1").await.is_ok());
    }
}
