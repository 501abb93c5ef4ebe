//! Review session endpoints

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use uuid::Uuid;

use review_core::types::{ItemResult, ReviewSession};
use review_core::{calculate_session_xp, levels_crossed, session, LevelTable};

use crate::error::{ApiError, Result};
use crate::models::{
    CompleteSessionResponse, DbReviewSession, SessionListQuery, SessionListResponse,
    SessionResultRequest, StartSessionRequest, XpAwardBody,
};
use crate::routes::auth::AuthenticatedAccount;
use crate::AppState;

/// POST /api/sessions
pub async fn start(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<Json<ReviewSession>> {
    let now = Utc::now();
    let new_session = session::start(
        Uuid::new_v4().to_string(),
        &auth.account_id,
        payload.set_id,
        payload.planned_items,
        now,
    );
    state
        .db
        .insert_session(&DbReviewSession::from_core(&new_session))
        .await?;
    Ok(Json(new_session))
}

/// GET /api/sessions
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Query(query): Query<SessionListQuery>,
) -> Result<Json<SessionListResponse>> {
    let (sessions, next_cursor) = state
        .db
        .list_sessions(
            &auth.account_id,
            query.cursor.as_deref(),
            query.limit.unwrap_or(20),
        )
        .await?;
    Ok(Json(SessionListResponse {
        sessions: sessions.iter().map(DbReviewSession::to_core).collect(),
        next_cursor,
    }))
}

/// GET /api/sessions/{id}
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Path(session_id): Path<String>,
) -> Result<Json<ReviewSession>> {
    let db_session = load(&state, &auth, &session_id).await?;
    Ok(Json(db_session.to_core()))
}

/// POST /api/sessions/{id}/results
pub async fn record_result(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Path(session_id): Path<String>,
    Json(payload): Json<SessionResultRequest>,
) -> Result<Json<ReviewSession>> {
    let db_session = load(&state, &auth, &session_id).await?;
    let mut current = db_session.to_core();
    let expected_version = current.version as i64;

    session::record_result(
        &mut current,
        ItemResult {
            item_id: payload.item_id,
            correct: payload.correct,
            response_ms: payload.response_ms,
            attempts: payload.attempts,
            confidence: payload.confidence,
            hints_used: payload.hints_used,
        },
        Utc::now(),
    )?;

    save(&state, &current, expected_version).await?;
    Ok(Json(current))
}

/// POST /api/sessions/{id}/pause
pub async fn pause(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Path(session_id): Path<String>,
) -> Result<Json<ReviewSession>> {
    let db_session = load(&state, &auth, &session_id).await?;
    let mut current = db_session.to_core();
    let expected_version = current.version as i64;

    session::pause(&mut current, Utc::now())?;
    save(&state, &current, expected_version).await?;
    Ok(Json(current))
}

/// POST /api/sessions/{id}/resume
pub async fn resume(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Path(session_id): Path<String>,
) -> Result<Json<ReviewSession>> {
    let db_session = load(&state, &auth, &session_id).await?;
    let mut current = db_session.to_core();
    let expected_version = current.version as i64;

    session::resume(&mut current, Utc::now())?;
    save(&state, &current, expected_version).await?;
    Ok(Json(current))
}

/// POST /api/sessions/{id}/complete
///
/// Completion freezes the statistics and grants session XP at most once;
/// the `xp_awarded` flag on the row is the durable idempotency guard.
pub async fn complete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Path(session_id): Path<String>,
) -> Result<Json<CompleteSessionResponse>> {
    let db_session = load(&state, &auth, &session_id).await?;
    let mut current = db_session.to_core();
    let expected_version = current.version as i64;

    session::complete(&mut current, Utc::now())?;
    save(&state, &current, expected_version).await?;

    let xp = if state.db.claim_xp_award(&auth.account_id, &session_id).await? {
        let session_xp = calculate_session_xp(&current);
        let table = LevelTable::new();

        let account = state
            .db
            .get_account(&auth.account_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("account {}", auth.account_id)))?;
        let (levels_gained, bonus_xp) =
            levels_crossed(&table, account.total_xp.max(0) as u64, session_xp as u64);

        let total_xp = state
            .db
            .add_xp(&auth.account_id, (session_xp + bonus_xp) as i64)
            .await?;

        for level in &levels_gained {
            tracing::info!(account_id = %auth.account_id, level, "level up");
        }

        Some(XpAwardBody {
            session_xp,
            bonus_xp,
            total_xp,
            levels_gained,
        })
    } else {
        None
    };

    Ok(Json(CompleteSessionResponse { session: current, xp }))
}

async fn load(
    state: &AppState,
    auth: &AuthenticatedAccount,
    session_id: &str,
) -> Result<DbReviewSession> {
    state
        .db
        .get_session(&auth.account_id, session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session {session_id}")))
}

async fn save(state: &AppState, current: &ReviewSession, expected_version: i64) -> Result<()> {
    state
        .db
        .update_session(&DbReviewSession::from_core(current), expected_version)
        .await
}
