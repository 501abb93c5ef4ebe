//! Sync repository: server-side LWW reconciliation for client pushes.
//!
//! Unlike the optimistic-checked CRUD paths, sync applies the core merge
//! policy: multi-device reconciliation is the whole point here, so the
//! losing side is discarded rather than rejected.

use chrono::{DateTime, Utc};
use review_core::{merge, Winner};

use super::Database;
use crate::error::Result;
use crate::models::{DbSavedItem, DbStudyList, MergeStamp};

const LIST_COLUMNS: &str =
    "id, user_id, name, kind, item_ids, version, created_at, updated_at, deleted_at";
const SAVED_COLUMNS: &str = r#"id, user_id, content_type, primary_text, secondary_text,
    part_of_speech, tags, list_ids, version, created_at, updated_at, deleted_at"#;

/// Outcome of applying one push batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct PushOutcome {
    pub applied: usize,
    pub discarded: usize,
}

fn stamp(version: i64, updated_at: DateTime<Utc>) -> MergeStamp {
    MergeStamp {
        version: version.max(0) as u64,
        updated_at,
    }
}

impl Database {
    /// Apply a batch of pushed study lists under LWW, in one transaction.
    pub async fn push_lists(&self, user_id: &str, lists: &[DbStudyList]) -> Result<PushOutcome> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        let lists = lists.to_vec();
        self.run("sync.push_lists", move || {
            let pool = pool.clone();
            let user_id = user_id.clone();
            let lists = lists.clone();
            async move {
                let mut outcome = PushOutcome::default();
                let mut tx = pool.begin().await?;

                for incoming in &lists {
                    let existing: Option<(String, i64, DateTime<Utc>)> = sqlx::query_as(
                        "SELECT user_id, version, updated_at FROM study_lists WHERE id = $1",
                    )
                    .bind(&incoming.id)
                    .fetch_optional(&mut *tx)
                    .await?;

                    match existing {
                        Some((owner, _, _)) if owner != user_id => {
                            tracing::warn!(list = %incoming.id, "push for foreign list id, skipping");
                            outcome.discarded += 1;
                            continue;
                        }
                        Some((_, version, updated_at))
                            if merge::resolve(
                                &stamp(incoming.version, incoming.updated_at),
                                &stamp(version, updated_at),
                            ) == Winner::Remote =>
                        {
                            // Server copy is newer; incoming loses.
                            outcome.discarded += 1;
                            continue;
                        }
                        _ => {}
                    }

                    sqlx::query(
                        r#"
                        INSERT INTO study_lists (id, user_id, name, kind, item_ids,
                            version, created_at, updated_at, deleted_at)
                        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                        ON CONFLICT (id) DO UPDATE SET
                            name = EXCLUDED.name,
                            kind = EXCLUDED.kind,
                            item_ids = EXCLUDED.item_ids,
                            version = EXCLUDED.version,
                            updated_at = EXCLUDED.updated_at,
                            deleted_at = EXCLUDED.deleted_at
                        "#,
                    )
                    .bind(&incoming.id)
                    .bind(&user_id)
                    .bind(&incoming.name)
                    .bind(&incoming.kind)
                    .bind(&incoming.item_ids)
                    .bind(incoming.version)
                    .bind(incoming.created_at)
                    .bind(incoming.updated_at)
                    .bind(incoming.deleted_at)
                    .execute(&mut *tx)
                    .await?;
                    outcome.applied += 1;
                }

                tx.commit().await?;
                Ok(outcome)
            }
        })
        .await
    }

    /// Apply a batch of pushed saved items under LWW, in one transaction.
    pub async fn push_saved_items(
        &self,
        user_id: &str,
        items: &[DbSavedItem],
    ) -> Result<PushOutcome> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        let items = items.to_vec();
        self.run("sync.push_items", move || {
            let pool = pool.clone();
            let user_id = user_id.clone();
            let items = items.clone();
            async move {
                let mut outcome = PushOutcome::default();
                let mut tx = pool.begin().await?;

                for incoming in &items {
                    let existing: Option<(String, i64, DateTime<Utc>)> = sqlx::query_as(
                        "SELECT user_id, version, updated_at FROM saved_items WHERE id = $1",
                    )
                    .bind(&incoming.id)
                    .fetch_optional(&mut *tx)
                    .await?;

                    match existing {
                        Some((owner, _, _)) if owner != user_id => {
                            tracing::warn!(item = %incoming.id, "push for foreign item id, skipping");
                            outcome.discarded += 1;
                            continue;
                        }
                        Some((_, version, updated_at))
                            if merge::resolve(
                                &stamp(incoming.version, incoming.updated_at),
                                &stamp(version, updated_at),
                            ) == Winner::Remote =>
                        {
                            outcome.discarded += 1;
                            continue;
                        }
                        _ => {}
                    }

                    sqlx::query(
                        r#"
                        INSERT INTO saved_items (id, user_id, content_type, primary_text,
                            secondary_text, part_of_speech, tags, list_ids, version,
                            created_at, updated_at, deleted_at)
                        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                        ON CONFLICT (id) DO UPDATE SET
                            content_type = EXCLUDED.content_type,
                            primary_text = EXCLUDED.primary_text,
                            secondary_text = EXCLUDED.secondary_text,
                            part_of_speech = EXCLUDED.part_of_speech,
                            tags = EXCLUDED.tags,
                            list_ids = EXCLUDED.list_ids,
                            version = EXCLUDED.version,
                            updated_at = EXCLUDED.updated_at,
                            deleted_at = EXCLUDED.deleted_at
                        "#,
                    )
                    .bind(&incoming.id)
                    .bind(&user_id)
                    .bind(&incoming.content_type)
                    .bind(&incoming.primary_text)
                    .bind(&incoming.secondary_text)
                    .bind(&incoming.part_of_speech)
                    .bind(&incoming.tags)
                    .bind(&incoming.list_ids)
                    .bind(incoming.version)
                    .bind(incoming.created_at)
                    .bind(incoming.updated_at)
                    .bind(incoming.deleted_at)
                    .execute(&mut *tx)
                    .await?;
                    outcome.applied += 1;
                }

                tx.commit().await?;
                Ok(outcome)
            }
        })
        .await
    }

    /// Lists changed since the watermark, tombstones included.
    pub async fn pull_lists(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<DbStudyList>> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        self.run("sync.pull_lists", move || {
            let pool = pool.clone();
            let user_id = user_id.clone();
            async move {
                let lists: Vec<DbStudyList> = match since {
                    Some(since) => {
                        sqlx::query_as(&format!(
                            r#"
                            SELECT {LIST_COLUMNS} FROM study_lists
                            WHERE user_id = $1 AND updated_at > $2
                            ORDER BY updated_at
                            "#
                        ))
                        .bind(&user_id)
                        .bind(since)
                        .fetch_all(&pool)
                        .await?
                    }
                    None => {
                        sqlx::query_as(&format!(
                            "SELECT {LIST_COLUMNS} FROM study_lists WHERE user_id = $1 ORDER BY updated_at"
                        ))
                        .bind(&user_id)
                        .fetch_all(&pool)
                        .await?
                    }
                };
                Ok(lists)
            }
        })
        .await
    }

    /// Saved items changed since the watermark, tombstones included.
    pub async fn pull_saved_items(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<DbSavedItem>> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        self.run("sync.pull_items", move || {
            let pool = pool.clone();
            let user_id = user_id.clone();
            async move {
                let items: Vec<DbSavedItem> = match since {
                    Some(since) => {
                        sqlx::query_as(&format!(
                            r#"
                            SELECT {SAVED_COLUMNS} FROM saved_items
                            WHERE user_id = $1 AND updated_at > $2
                            ORDER BY updated_at
                            "#
                        ))
                        .bind(&user_id)
                        .bind(since)
                        .fetch_all(&pool)
                        .await?
                    }
                    None => {
                        sqlx::query_as(&format!(
                            "SELECT {SAVED_COLUMNS} FROM saved_items WHERE user_id = $1 ORDER BY updated_at"
                        ))
                        .bind(&user_id)
                        .fetch_all(&pool)
                        .await?
                    }
                };
                Ok(items)
            }
        })
        .await
    }
}
