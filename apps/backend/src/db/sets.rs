//! Review set repository
//!
//! Set membership is a bidirectional denormalization (set.item_ids and
//! item.set_ids). Both sides of every edit happen inside one transaction
//! so a partial failure can never leave the relationship asymmetric.

use std::collections::BTreeSet;

use super::Database;
use crate::error::{ApiError, Result};
use crate::models::DbReviewSet;

const SET_COLUMNS: &str = r#"id, user_id, name, description, item_ids, item_count,
    content_types, is_public, shared_with, original_set_id, progress_new,
    progress_learning, progress_mastered, version, created_at, updated_at"#;

impl Database {
    /// Insert a new review set
    pub async fn insert_set(&self, set: &DbReviewSet) -> Result<()> {
        let pool = self.pool.clone();
        let set = set.clone();
        self.run("sets.insert", move || {
            let pool = pool.clone();
            let set = set.clone();
            async move {
                sqlx::query(
                    r#"
                    INSERT INTO review_sets (id, user_id, name, description, item_ids,
                        item_count, content_types, is_public, shared_with, original_set_id,
                        progress_new, progress_learning, progress_mastered, version,
                        created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                            $15, $16)
                    "#,
                )
                .bind(&set.id)
                .bind(&set.user_id)
                .bind(&set.name)
                .bind(&set.description)
                .bind(&set.item_ids)
                .bind(set.item_count)
                .bind(&set.content_types)
                .bind(set.is_public)
                .bind(&set.shared_with)
                .bind(&set.original_set_id)
                .bind(set.progress_new)
                .bind(set.progress_learning)
                .bind(set.progress_mastered)
                .bind(set.version)
                .bind(set.created_at)
                .bind(set.updated_at)
                .execute(&pool)
                .await?;
                Ok(())
            }
        })
        .await
    }

    /// Get one set; visible to its owner and anyone it is shared with
    pub async fn get_set(&self, user_id: &str, set_id: &str) -> Result<Option<DbReviewSet>> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        let set_id = set_id.to_string();
        self.run("sets.get", move || {
            let pool = pool.clone();
            let user_id = user_id.clone();
            let set_id = set_id.clone();
            async move {
                let set = sqlx::query_as::<_, DbReviewSet>(&format!(
                    r#"
                    SELECT {SET_COLUMNS} FROM review_sets
                    WHERE id = $1
                      AND (user_id = $2 OR is_public OR $2 = ANY(shared_with))
                    "#
                ))
                .bind(&set_id)
                .bind(&user_id)
                .fetch_optional(&pool)
                .await?;
                Ok(set)
            }
        })
        .await
    }

    /// All sets owned by a user
    pub async fn list_sets(&self, user_id: &str) -> Result<Vec<DbReviewSet>> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        self.run("sets.list", move || {
            let pool = pool.clone();
            let user_id = user_id.clone();
            async move {
                let sets = sqlx::query_as::<_, DbReviewSet>(&format!(
                    "SELECT {SET_COLUMNS} FROM review_sets WHERE user_id = $1 ORDER BY created_at"
                ))
                .bind(&user_id)
                .fetch_all(&pool)
                .await?;
                Ok(sets)
            }
        })
        .await
    }

    /// Update set metadata with an optimistic version check
    pub async fn update_set(&self, set: &DbReviewSet, expected_version: i64) -> Result<()> {
        let pool = self.pool.clone();
        let set = set.clone();
        self.run("sets.update", move || {
            let pool = pool.clone();
            let set = set.clone();
            async move {
                let result = sqlx::query(
                    r#"
                    UPDATE review_sets SET
                        name = $4, description = $5, is_public = $6, shared_with = $7,
                        version = $8, updated_at = $9
                    WHERE id = $1 AND user_id = $2 AND version = $3
                    "#,
                )
                .bind(&set.id)
                .bind(&set.user_id)
                .bind(expected_version)
                .bind(&set.name)
                .bind(&set.description)
                .bind(set.is_public)
                .bind(&set.shared_with)
                .bind(set.version)
                .bind(set.updated_at)
                .execute(&pool)
                .await?;

                if result.rows_affected() == 0 {
                    let exists: Option<(i64,)> = sqlx::query_as(
                        "SELECT version FROM review_sets WHERE id = $1 AND user_id = $2",
                    )
                    .bind(&set.id)
                    .bind(&set.user_id)
                    .fetch_optional(&pool)
                    .await?;
                    return match exists {
                        Some((current,)) => Err(ApiError::Conflict(format!(
                            "set {} is at version {current}, expected {expected_version}",
                            set.id
                        ))),
                        None => Err(ApiError::NotFound(format!("set {}", set.id))),
                    };
                }
                Ok(())
            }
        })
        .await
    }

    /// Add and remove items, keeping both sides of the relationship and
    /// the set's denormalized counts consistent in one transaction.
    pub async fn modify_set_items(
        &self,
        user_id: &str,
        set_id: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<DbReviewSet> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        let set_id = set_id.to_string();
        let add: Vec<String> = BTreeSet::from_iter(add.iter().cloned()).into_iter().collect();
        let remove: Vec<String> = BTreeSet::from_iter(remove.iter().cloned()).into_iter().collect();
        self.run("sets.modify_items", move || {
            let pool = pool.clone();
            let user_id = user_id.clone();
            let set_id = set_id.clone();
            let add = add.clone();
            let remove = remove.clone();
            async move {
                let mut tx = pool.begin().await?;

                let set = sqlx::query_as::<_, DbReviewSet>(&format!(
                    "SELECT {SET_COLUMNS} FROM review_sets WHERE id = $1 AND user_id = $2 FOR UPDATE"
                ))
                .bind(&set_id)
                .bind(&user_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("set {set_id}")))?;

                // Only the caller's active items may join.
                if !add.is_empty() {
                    let known: Vec<(String,)> = sqlx::query_as(
                        "SELECT id FROM review_items WHERE user_id = $1 AND id = ANY($2) AND is_active",
                    )
                    .bind(&user_id)
                    .bind(&add)
                    .fetch_all(&mut *tx)
                    .await?;
                    if known.len() != add.len() {
                        let known: BTreeSet<_> = known.into_iter().map(|r| r.0).collect();
                        let missing = add
                            .iter()
                            .find(|id| !known.contains(*id))
                            .cloned()
                            .unwrap_or_default();
                        return Err(ApiError::NotFound(format!("item {missing}")));
                    }

                    sqlx::query(
                        r#"
                        UPDATE review_items
                        SET set_ids = array_append(set_ids, $3),
                            version = version + 1, updated_at = NOW()
                        WHERE user_id = $1 AND id = ANY($2) AND NOT ($3 = ANY(set_ids))
                        "#,
                    )
                    .bind(&user_id)
                    .bind(&add)
                    .bind(&set_id)
                    .execute(&mut *tx)
                    .await?;
                }

                if !remove.is_empty() {
                    sqlx::query(
                        r#"
                        UPDATE review_items
                        SET set_ids = array_remove(set_ids, $3),
                            version = version + 1, updated_at = NOW()
                        WHERE user_id = $1 AND id = ANY($2) AND $3 = ANY(set_ids)
                        "#,
                    )
                    .bind(&user_id)
                    .bind(&remove)
                    .bind(&set_id)
                    .execute(&mut *tx)
                    .await?;
                }

                // Recompute membership and the denormalized columns.
                let mut item_ids: BTreeSet<String> = set.item_ids.iter().cloned().collect();
                for id in &add {
                    item_ids.insert(id.clone());
                }
                for id in &remove {
                    item_ids.remove(id);
                }
                let item_ids: Vec<String> = item_ids.into_iter().collect();

                let members: Vec<(String, String)> = sqlx::query_as(
                    "SELECT content_type, status FROM review_items WHERE user_id = $1 AND id = ANY($2)",
                )
                .bind(&user_id)
                .bind(&item_ids)
                .fetch_all(&mut *tx)
                .await?;

                let content_types: Vec<String> = members
                    .iter()
                    .map(|(ct, _)| ct.clone())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                let count_of = |status: &str| {
                    members.iter().filter(|(_, s)| s == status).count() as i32
                };

                let updated = sqlx::query_as::<_, DbReviewSet>(&format!(
                    r#"
                    UPDATE review_sets SET
                        item_ids = $3, item_count = $4, content_types = $5,
                        progress_new = $6, progress_learning = $7, progress_mastered = $8,
                        version = version + 1, updated_at = NOW()
                    WHERE id = $1 AND user_id = $2
                    RETURNING {SET_COLUMNS}
                    "#
                ))
                .bind(&set_id)
                .bind(&user_id)
                .bind(&item_ids)
                .bind(item_ids.len() as i32)
                .bind(&content_types)
                .bind(count_of("new"))
                .bind(count_of("learning"))
                .bind(count_of("mastered"))
                .fetch_one(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok(updated)
            }
        })
        .await
    }

    /// Refresh a set's denormalized progress counts from member statuses
    /// (called after a member item's status changes).
    pub async fn refresh_set_progress(&self, user_id: &str, set_id: &str) -> Result<()> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        let set_id = set_id.to_string();
        self.run("sets.refresh_progress", move || {
            let pool = pool.clone();
            let user_id = user_id.clone();
            let set_id = set_id.clone();
            async move {
                sqlx::query(
                    r#"
                    UPDATE review_sets s SET
                        progress_new = counts.new_count,
                        progress_learning = counts.learning_count,
                        progress_mastered = counts.mastered_count,
                        version = version + 1, updated_at = NOW()
                    FROM (
                        SELECT
                            COUNT(*) FILTER (WHERE status = 'new')::INT AS new_count,
                            COUNT(*) FILTER (WHERE status = 'learning')::INT AS learning_count,
                            COUNT(*) FILTER (WHERE status = 'mastered')::INT AS mastered_count
                        FROM review_items
                        WHERE user_id = $2 AND $1 = ANY(set_ids)
                    ) counts
                    WHERE s.id = $1 AND s.user_id = $2
                    "#,
                )
                .bind(&set_id)
                .bind(&user_id)
                .execute(&pool)
                .await?;
                Ok(())
            }
        })
        .await
    }

    /// Delete a set and strip its id from every referencing item, in one
    /// transaction.
    pub async fn delete_set(&self, user_id: &str, set_id: &str) -> Result<()> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        let set_id = set_id.to_string();
        self.run("sets.delete", move || {
            let pool = pool.clone();
            let user_id = user_id.clone();
            let set_id = set_id.clone();
            async move {
                let mut tx = pool.begin().await?;

                let deleted = sqlx::query("DELETE FROM review_sets WHERE id = $1 AND user_id = $2")
                    .bind(&set_id)
                    .bind(&user_id)
                    .execute(&mut *tx)
                    .await?;
                if deleted.rows_affected() == 0 {
                    return Err(ApiError::NotFound(format!("set {set_id}")));
                }

                sqlx::query(
                    r#"
                    UPDATE review_items
                    SET set_ids = array_remove(set_ids, $2),
                        version = version + 1, updated_at = NOW()
                    WHERE user_id = $1 AND $2 = ANY(set_ids)
                    "#,
                )
                .bind(&user_id)
                .bind(&set_id)
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok(())
            }
        })
        .await
    }
}
