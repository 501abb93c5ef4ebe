//! Review item repository

use sqlx::QueryBuilder;

use super::Database;
use crate::error::{ApiError, Result};
use crate::models::{DbReviewItem, ItemListQuery};

const ITEM_COLUMNS: &str = r#"id, user_id, content_type, content_id, primary_text,
    secondary_text, tertiary_text, audio_url, image_url, status, interval_days,
    ease_factor, repetitions, last_reviewed_at, next_review_at, review_count,
    correct_count, incorrect_count, current_streak, best_streak, avg_response_ms,
    tags, set_ids, priority, pinned_at, is_active, version, created_at, updated_at"#;

/// Hard cap on page size for item listings.
pub const MAX_PAGE_SIZE: u32 = 100;

impl Database {
    /// Insert a new review item
    pub async fn insert_item(&self, item: &DbReviewItem) -> Result<()> {
        let pool = self.pool.clone();
        let item = item.clone();
        self.run("items.insert", move || {
            let pool = pool.clone();
            let item = item.clone();
            async move {
                sqlx::query(
                    r#"
                    INSERT INTO review_items (id, user_id, content_type, content_id,
                        primary_text, secondary_text, tertiary_text, audio_url, image_url,
                        status, interval_days, ease_factor, repetitions, last_reviewed_at,
                        next_review_at, review_count, correct_count, incorrect_count,
                        current_streak, best_streak, avg_response_ms, tags, set_ids,
                        priority, pinned_at, is_active, version, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                            $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26,
                            $27, $28, $29)
                    "#,
                )
                .bind(&item.id)
                .bind(&item.user_id)
                .bind(&item.content_type)
                .bind(&item.content_id)
                .bind(&item.primary_text)
                .bind(&item.secondary_text)
                .bind(&item.tertiary_text)
                .bind(&item.audio_url)
                .bind(&item.image_url)
                .bind(&item.status)
                .bind(item.interval_days)
                .bind(item.ease_factor)
                .bind(item.repetitions)
                .bind(item.last_reviewed_at)
                .bind(item.next_review_at)
                .bind(item.review_count)
                .bind(item.correct_count)
                .bind(item.incorrect_count)
                .bind(item.current_streak)
                .bind(item.best_streak)
                .bind(item.avg_response_ms)
                .bind(&item.tags)
                .bind(&item.set_ids)
                .bind(&item.priority)
                .bind(item.pinned_at)
                .bind(item.is_active)
                .bind(item.version)
                .bind(item.created_at)
                .bind(item.updated_at)
                .execute(&pool)
                .await?;
                Ok(())
            }
        })
        .await
    }

    /// Get one item by id, scoped to its owner
    pub async fn get_item(&self, user_id: &str, item_id: &str) -> Result<Option<DbReviewItem>> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        let item_id = item_id.to_string();
        self.run("items.get", move || {
            let pool = pool.clone();
            let user_id = user_id.clone();
            let item_id = item_id.clone();
            async move {
                let item = sqlx::query_as::<_, DbReviewItem>(&format!(
                    "SELECT {ITEM_COLUMNS} FROM review_items WHERE id = $1 AND user_id = $2"
                ))
                .bind(&item_id)
                .bind(&user_id)
                .fetch_optional(&pool)
                .await?;
                Ok(item)
            }
        })
        .await
    }

    /// Update an item with an optimistic version check.
    ///
    /// `item.version` must already be the bumped value; `expected_version`
    /// is the version the caller last read. A mismatch is a conflict.
    pub async fn update_item(&self, item: &DbReviewItem, expected_version: i64) -> Result<()> {
        let pool = self.pool.clone();
        let item = item.clone();
        self.run("items.update", move || {
            let pool = pool.clone();
            let item = item.clone();
            async move {
                let result = sqlx::query(
                    r#"
                    UPDATE review_items SET
                        primary_text = $4, secondary_text = $5, tertiary_text = $6,
                        audio_url = $7, image_url = $8, status = $9, interval_days = $10,
                        ease_factor = $11, repetitions = $12, last_reviewed_at = $13,
                        next_review_at = $14, review_count = $15, correct_count = $16,
                        incorrect_count = $17, current_streak = $18, best_streak = $19,
                        avg_response_ms = $20, tags = $21, set_ids = $22, priority = $23,
                        pinned_at = $24, is_active = $25, version = $26, updated_at = $27
                    WHERE id = $1 AND user_id = $2 AND version = $3
                    "#,
                )
                .bind(&item.id)
                .bind(&item.user_id)
                .bind(expected_version)
                .bind(&item.primary_text)
                .bind(&item.secondary_text)
                .bind(&item.tertiary_text)
                .bind(&item.audio_url)
                .bind(&item.image_url)
                .bind(&item.status)
                .bind(item.interval_days)
                .bind(item.ease_factor)
                .bind(item.repetitions)
                .bind(item.last_reviewed_at)
                .bind(item.next_review_at)
                .bind(item.review_count)
                .bind(item.correct_count)
                .bind(item.incorrect_count)
                .bind(item.current_streak)
                .bind(item.best_streak)
                .bind(item.avg_response_ms)
                .bind(&item.tags)
                .bind(&item.set_ids)
                .bind(&item.priority)
                .bind(item.pinned_at)
                .bind(item.is_active)
                .bind(item.version)
                .bind(item.updated_at)
                .execute(&pool)
                .await?;

                if result.rows_affected() == 0 {
                    // Distinguish a stale version from a missing row.
                    let exists: Option<(i64,)> = sqlx::query_as(
                        "SELECT version FROM review_items WHERE id = $1 AND user_id = $2",
                    )
                    .bind(&item.id)
                    .bind(&item.user_id)
                    .fetch_optional(&pool)
                    .await?;
                    return match exists {
                        Some((current,)) => Err(ApiError::Conflict(format!(
                            "item {} is at version {current}, expected {expected_version}",
                            item.id
                        ))),
                        None => Err(ApiError::NotFound(format!("item {}", item.id))),
                    };
                }
                Ok(())
            }
        })
        .await
    }

    /// Soft-deactivate an item (never hard-deleted by users)
    pub async fn deactivate_item(&self, user_id: &str, item_id: &str) -> Result<()> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        let item_id = item_id.to_string();
        self.run("items.deactivate", move || {
            let pool = pool.clone();
            let user_id = user_id.clone();
            let item_id = item_id.clone();
            async move {
                let result = sqlx::query(
                    r#"
                    UPDATE review_items
                    SET is_active = FALSE, version = version + 1, updated_at = NOW()
                    WHERE id = $1 AND user_id = $2 AND is_active
                    "#,
                )
                .bind(&item_id)
                .bind(&user_id)
                .execute(&pool)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(ApiError::NotFound(format!("item {item_id}")));
                }
                Ok(())
            }
        })
        .await
    }

    /// Hard delete (explicit admin action only)
    pub async fn delete_item(&self, user_id: &str, item_id: &str) -> Result<()> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        let item_id = item_id.to_string();
        self.run("items.delete", move || {
            let pool = pool.clone();
            let user_id = user_id.clone();
            let item_id = item_id.clone();
            async move {
                let result = sqlx::query("DELETE FROM review_items WHERE id = $1 AND user_id = $2")
                    .bind(&item_id)
                    .bind(&user_id)
                    .execute(&pool)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(ApiError::NotFound(format!("item {item_id}")));
                }
                Ok(())
            }
        })
        .await
    }

    /// Cursor-paginated, filtered listing of a user's active items.
    ///
    /// Returns one page plus the cursor for the next, if any.
    pub async fn list_items(
        &self,
        user_id: &str,
        query: &ItemListQuery,
    ) -> Result<(Vec<DbReviewItem>, Option<String>)> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        let status = query.status.clone();
        let content_type = query.content_type.clone();
        let due_before = query.due_before_ms.map(crate::models::ms_to_utc);
        let cursor = query.cursor.clone();
        let limit = query.limit.unwrap_or(50).clamp(1, MAX_PAGE_SIZE) as i64;

        self.run("items.list", move || {
            let pool = pool.clone();
            let user_id = user_id.clone();
            let status = status.clone();
            let content_type = content_type.clone();
            let cursor = cursor.clone();
            async move {
                let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(format!(
                    "SELECT {ITEM_COLUMNS} FROM review_items WHERE is_active AND user_id = "
                ));
                builder.push_bind(&user_id);
                if let Some(status) = &status {
                    builder.push(" AND status = ").push_bind(status);
                }
                if let Some(content_type) = &content_type {
                    builder.push(" AND content_type = ").push_bind(content_type);
                }
                if let Some(due_before) = due_before {
                    builder.push(" AND next_review_at <= ").push_bind(due_before);
                }
                if let Some(cursor) = &cursor {
                    builder.push(" AND id > ").push_bind(cursor);
                }
                builder.push(" ORDER BY id LIMIT ").push_bind(limit + 1);

                let mut items: Vec<DbReviewItem> =
                    builder.build_query_as().fetch_all(&pool).await?;

                let next_cursor = if items.len() as i64 > limit {
                    items.truncate(limit as usize);
                    items.last().map(|i| i.id.clone())
                } else {
                    None
                };
                Ok((items, next_cursor))
            }
        })
        .await
    }

    /// All active items for a user, for app-side aggregate reduction.
    pub async fn items_for_stats(&self, user_id: &str) -> Result<Vec<DbReviewItem>> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        self.run("items.for_stats", move || {
            let pool = pool.clone();
            let user_id = user_id.clone();
            async move {
                let items = sqlx::query_as::<_, DbReviewItem>(&format!(
                    "SELECT {ITEM_COLUMNS} FROM review_items WHERE user_id = $1 AND is_active"
                ))
                .bind(&user_id)
                .fetch_all(&pool)
                .await?;
                Ok(items)
            }
        })
        .await
    }
}
