use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::repos::{RelationPatch, RelationsRepo, RepoError},
    domain::entities::RelationRecord,
    domain::types::RelationFlag,
};

use super::{PostgresRepositories, map_sqlx_error};

// A statement may carry at most 65 535 bind parameters. Batches are split
// well below that and run in one transaction.
const CREATE_CHUNK_ROWS: usize = 4_096; // 7 binds per row
const DELETE_CHUNK_PAIRS: usize = 8_192; // 2 binds per pair

const RELATION_COLUMNS: &str = "owner_user_id, related_user_id, is_blocked, is_following, \
     is_subscribed, created_at, updated_at";

impl PostgresRepositories {
    async fn related_user_ids(
        &self,
        owner_user_id: &str,
        flag: RelationFlag,
    ) -> Result<Vec<String>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT related_user_id FROM user_relations WHERE owner_user_id = ",
        );
        qb.push_bind(owner_user_id);
        qb.push(" AND ");
        qb.push(flag.column());
        qb.push(" AND NOT is_blocked ORDER BY related_user_id");

        qb.build_query_scalar::<String>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl RelationsRepo for PostgresRepositories {
    async fn create(&self, relations: &[RelationRecord]) -> Result<(), RepoError> {
        if relations.is_empty() {
            return Ok(());
        }

        let now = OffsetDateTime::now_utc();
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        for chunk in relations.chunks(CREATE_CHUNK_ROWS) {
            let mut qb = QueryBuilder::<Postgres>::new(format!(
                "INSERT INTO user_relations ({RELATION_COLUMNS}) "
            ));
            qb.push_values(chunk, |mut row, relation| {
                row.push_bind(&relation.owner_user_id)
                    .push_bind(&relation.related_user_id)
                    .push_bind(relation.is_blocked)
                    .push_bind(relation.is_following)
                    .push_bind(relation.is_subscribed)
                    .push_bind(relation.created_at.unwrap_or(now))
                    .push_bind(relation.updated_at.unwrap_or(now));
            });

            qb.build()
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn delete(&self, relations: &[RelationRecord]) -> Result<(), RepoError> {
        if relations.is_empty() {
            return Ok(());
        }

        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        for chunk in relations.chunks(DELETE_CHUNK_PAIRS) {
            let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM user_relations WHERE ");
            for (index, relation) in chunk.iter().enumerate() {
                if index > 0 {
                    qb.push(" OR ");
                }
                qb.push("(owner_user_id = ");
                qb.push_bind(&relation.owner_user_id);
                qb.push(" AND related_user_id = ");
                qb.push_bind(&relation.related_user_id);
                qb.push(")");
            }

            qb.build()
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn take(
        &self,
        owner_user_id: &str,
        related_user_id: &str,
    ) -> Result<RelationRecord, RepoError> {
        let row = sqlx::query_as::<_, RelationRecord>(&format!(
            "SELECT {RELATION_COLUMNS} FROM user_relations \
             WHERE owner_user_id = $1 AND related_user_id = $2"
        ))
        .bind(owner_user_id)
        .bind(related_user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.ok_or(RepoError::NotFound)
    }

    async fn update_by_patch(
        &self,
        owner_user_id: &str,
        related_user_id: &str,
        patch: &RelationPatch,
    ) -> Result<(), RepoError> {
        let updated_at = patch.updated_at.unwrap_or_else(OffsetDateTime::now_utc);

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE user_relations SET ");
        for (flag, value) in patch.flags() {
            qb.push(flag.column());
            qb.push(" = ");
            qb.push_bind(value);
            qb.push(", ");
        }
        qb.push("updated_at = ");
        qb.push_bind(updated_at);
        qb.push(" WHERE owner_user_id = ");
        qb.push_bind(owner_user_id);
        qb.push(" AND related_user_id = ");
        qb.push_bind(related_user_id);

        let result = qb
            .build()
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn follower_user_ids(&self, owner_user_id: &str) -> Result<Vec<String>, RepoError> {
        self.related_user_ids(owner_user_id, RelationFlag::Following)
            .await
    }

    async fn subscriber_user_ids(&self, owner_user_id: &str) -> Result<Vec<String>, RepoError> {
        self.related_user_ids(owner_user_id, RelationFlag::Subscribed)
            .await
    }
}
