//! Review session repository

use chrono::{DateTime, Utc};

use super::Database;
use crate::error::{ApiError, Result};
use crate::models::DbReviewSession;

const SESSION_COLUMNS: &str = r#"id, user_id, set_id, planned_items, items_reviewed,
    accuracy, avg_response_ms, correct_items, incorrect_items, started_at,
    completed_at, is_completed, paused_at, paused_ms, duration_ms, xp_awarded,
    version, updated_at"#;

/// Hard cap on page size for session listings.
pub const MAX_SESSION_PAGE: u32 = 50;

/// Opaque cursor: "<started_at epoch microseconds>:<session id>".
///
/// Microsecond precision matches the database timestamp type, so keyset
/// pagination never skips rows started within the same millisecond.
fn parse_cursor(cursor: &str) -> Result<(DateTime<Utc>, String)> {
    let (micros, id) = cursor
        .split_once(':')
        .ok_or_else(|| ApiError::BadRequest(format!("malformed cursor: {cursor}")))?;
    let micros: i64 = micros
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("malformed cursor: {cursor}")))?;
    let started_at = DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| ApiError::BadRequest(format!("malformed cursor: {cursor}")))?;
    Ok((started_at, id.to_string()))
}

fn encode_cursor(session: &DbReviewSession) -> String {
    format!("{}:{}", session.started_at.timestamp_micros(), session.id)
}

impl Database {
    /// Insert a newly started session
    pub async fn insert_session(&self, session: &DbReviewSession) -> Result<()> {
        let pool = self.pool.clone();
        let session = session.clone();
        self.run("sessions.insert", move || {
            let pool = pool.clone();
            let session = session.clone();
            async move {
                sqlx::query(
                    r#"
                    INSERT INTO review_sessions (id, user_id, set_id, planned_items,
                        items_reviewed, accuracy, avg_response_ms, correct_items,
                        incorrect_items, started_at, completed_at, is_completed,
                        paused_at, paused_ms, duration_ms, xp_awarded, version, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                            $15, $16, $17, $18)
                    "#,
                )
                .bind(&session.id)
                .bind(&session.user_id)
                .bind(&session.set_id)
                .bind(session.planned_items)
                .bind(&session.items_reviewed)
                .bind(session.accuracy)
                .bind(session.avg_response_ms)
                .bind(session.correct_items)
                .bind(session.incorrect_items)
                .bind(session.started_at)
                .bind(session.completed_at)
                .bind(session.is_completed)
                .bind(session.paused_at)
                .bind(session.paused_ms)
                .bind(session.duration_ms)
                .bind(session.xp_awarded)
                .bind(session.version)
                .bind(session.updated_at)
                .execute(&pool)
                .await?;
                Ok(())
            }
        })
        .await
    }

    /// Get one session by id, scoped to its owner
    pub async fn get_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<DbReviewSession>> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        let session_id = session_id.to_string();
        self.run("sessions.get", move || {
            let pool = pool.clone();
            let user_id = user_id.clone();
            let session_id = session_id.clone();
            async move {
                let session = sqlx::query_as::<_, DbReviewSession>(&format!(
                    "SELECT {SESSION_COLUMNS} FROM review_sessions WHERE id = $1 AND user_id = $2"
                ))
                .bind(&session_id)
                .bind(&user_id)
                .fetch_optional(&pool)
                .await?;
                Ok(session)
            }
        })
        .await
    }

    /// Persist a session mutation with an optimistic version check
    pub async fn update_session(
        &self,
        session: &DbReviewSession,
        expected_version: i64,
    ) -> Result<()> {
        let pool = self.pool.clone();
        let session = session.clone();
        self.run("sessions.update", move || {
            let pool = pool.clone();
            let session = session.clone();
            async move {
                let result = sqlx::query(
                    r#"
                    UPDATE review_sessions SET
                        items_reviewed = $4, accuracy = $5, avg_response_ms = $6,
                        correct_items = $7, incorrect_items = $8, completed_at = $9,
                        is_completed = $10, paused_at = $11, paused_ms = $12,
                        duration_ms = $13, version = $14, updated_at = $15
                    WHERE id = $1 AND user_id = $2 AND version = $3
                    "#,
                )
                .bind(&session.id)
                .bind(&session.user_id)
                .bind(expected_version)
                .bind(&session.items_reviewed)
                .bind(session.accuracy)
                .bind(session.avg_response_ms)
                .bind(session.correct_items)
                .bind(session.incorrect_items)
                .bind(session.completed_at)
                .bind(session.is_completed)
                .bind(session.paused_at)
                .bind(session.paused_ms)
                .bind(session.duration_ms)
                .bind(session.version)
                .bind(session.updated_at)
                .execute(&pool)
                .await?;

                if result.rows_affected() == 0 {
                    let exists: Option<(i64,)> = sqlx::query_as(
                        "SELECT version FROM review_sessions WHERE id = $1 AND user_id = $2",
                    )
                    .bind(&session.id)
                    .bind(&session.user_id)
                    .fetch_optional(&pool)
                    .await?;
                    return match exists {
                        Some((current,)) => Err(ApiError::Conflict(format!(
                            "session {} is at version {current}, expected {expected_version}",
                            session.id
                        ))),
                        None => Err(ApiError::NotFound(format!("session {}", session.id))),
                    };
                }
                Ok(())
            }
        })
        .await
    }

    /// Claim the one-time XP award for a session.
    ///
    /// Returns false if the award was already claimed; the flag makes the
    /// grant idempotent across retries and restarts.
    pub async fn claim_xp_award(&self, user_id: &str, session_id: &str) -> Result<bool> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        let session_id = session_id.to_string();
        self.run("sessions.claim_xp", move || {
            let pool = pool.clone();
            let user_id = user_id.clone();
            let session_id = session_id.clone();
            async move {
                let result = sqlx::query(
                    r#"
                    UPDATE review_sessions SET xp_awarded = TRUE
                    WHERE id = $1 AND user_id = $2 AND NOT xp_awarded
                    "#,
                )
                .bind(&session_id)
                .bind(&user_id)
                .execute(&pool)
                .await?;
                Ok(result.rows_affected() > 0)
            }
        })
        .await
    }

    /// Cursor-paginated session history, most recent first
    pub async fn list_sessions(
        &self,
        user_id: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<(Vec<DbReviewSession>, Option<String>)> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        let cursor = match cursor {
            Some(c) => Some(parse_cursor(c)?),
            None => None,
        };
        let limit = limit.clamp(1, MAX_SESSION_PAGE) as i64;
        self.run("sessions.list", move || {
            let pool = pool.clone();
            let user_id = user_id.clone();
            let cursor = cursor.clone();
            async move {
                let mut sessions: Vec<DbReviewSession> = match &cursor {
                    Some((started_at, id)) => {
                        sqlx::query_as(&format!(
                            r#"
                            SELECT {SESSION_COLUMNS} FROM review_sessions
                            WHERE user_id = $1 AND (started_at, id) < ($2, $3)
                            ORDER BY started_at DESC, id DESC
                            LIMIT $4
                            "#
                        ))
                        .bind(&user_id)
                        .bind(started_at)
                        .bind(id)
                        .bind(limit + 1)
                        .fetch_all(&pool)
                        .await?
                    }
                    None => {
                        sqlx::query_as(&format!(
                            r#"
                            SELECT {SESSION_COLUMNS} FROM review_sessions
                            WHERE user_id = $1
                            ORDER BY started_at DESC, id DESC
                            LIMIT $2
                            "#
                        ))
                        .bind(&user_id)
                        .bind(limit + 1)
                        .fetch_all(&pool)
                        .await?
                    }
                };

                let next_cursor = if sessions.len() as i64 > limit {
                    sessions.truncate(limit as usize);
                    sessions.last().map(encode_cursor)
                } else {
                    None
                };
                Ok((sessions, next_cursor))
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips() {
        let cursor = "1750000000000123:abc-123";
        let (at, id) = parse_cursor(cursor).unwrap();
        assert_eq!(at.timestamp_micros(), 1_750_000_000_000_123);
        assert_eq!(id, "abc-123");
    }

    #[test]
    fn malformed_cursor_is_rejected() {
        assert!(parse_cursor("nonsense").is_err());
        assert!(parse_cursor("abc:def").is_err());
    }
}
