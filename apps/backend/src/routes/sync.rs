//! Client sync endpoints (premium-gated)
//!
//! Wire timestamps are plain epoch milliseconds; conversion to and from
//! the database's native timestamps happens in the models layer.

use axum::{extract::State, Extension, Json};
use chrono::Utc;

use crate::error::{ApiError, Result};
use crate::models::{
    ms_to_utc, utc_to_ms, DbSavedItem, DbStudyList, SyncPullRequest, SyncPullResponse,
    SyncPushRequest, SyncPushResponse, MAX_SYNC_BATCH,
};
use crate::routes::auth::AuthenticatedAccount;
use crate::AppState;

/// POST /api/sync/push
pub async fn push(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Json(payload): Json<SyncPushRequest>,
) -> Result<Json<SyncPushResponse>> {
    auth.require_premium()?;

    if payload.lists.len() + payload.items.len() > MAX_SYNC_BATCH {
        return Err(ApiError::BadRequest(format!(
            "push exceeds the {MAX_SYNC_BATCH}-record batch limit"
        )));
    }

    let now = Utc::now();
    let lists: Vec<DbStudyList> = payload
        .lists
        .iter()
        .map(|w| DbStudyList::from_wire(&auth.account_id, w, now))
        .collect();
    let items: Vec<DbSavedItem> = payload
        .items
        .iter()
        .map(|w| DbSavedItem::from_wire(&auth.account_id, w, now))
        .collect();

    let list_outcome = state.db.push_lists(&auth.account_id, &lists).await?;
    let item_outcome = state.db.push_saved_items(&auth.account_id, &items).await?;

    tracing::debug!(
        account_id = %auth.account_id,
        applied = list_outcome.applied + item_outcome.applied,
        discarded = list_outcome.discarded + item_outcome.discarded,
        "sync push"
    );

    Ok(Json(SyncPushResponse {
        applied: list_outcome.applied + item_outcome.applied,
        discarded: list_outcome.discarded + item_outcome.discarded,
        server_time_ms: utc_to_ms(now),
    }))
}

/// POST /api/sync/pull
pub async fn pull(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Json(payload): Json<SyncPullRequest>,
) -> Result<Json<SyncPullResponse>> {
    auth.require_premium()?;

    let since = payload.since_ms.map(ms_to_utc);
    let now = Utc::now();

    let lists = state.db.pull_lists(&auth.account_id, since).await?;
    let items = state.db.pull_saved_items(&auth.account_id, since).await?;

    Ok(Json(SyncPullResponse {
        lists: lists.iter().map(DbStudyList::to_wire).collect(),
        items: items.iter().map(DbSavedItem::to_wire).collect(),
        server_time_ms: utc_to_ms(now),
    }))
}
