//! Review set endpoints

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use uuid::Uuid;

use review_core::types::ReviewSet;

use crate::error::{ApiError, Result};
use crate::models::{
    CreateSetRequest, DbReviewSet, SetItemsRequest, SetListResponse, UpdateSetRequest,
};
use crate::routes::auth::AuthenticatedAccount;
use crate::AppState;

/// POST /api/sets
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Json(payload): Json<CreateSetRequest>,
) -> Result<Json<ReviewSet>> {
    let now = Utc::now();
    let mut set = ReviewSet::new(&auth.account_id, payload.name, Uuid::new_v4().to_string(), now);
    set.description = payload.description;
    set.is_public = payload.is_public;

    state.db.insert_set(&DbReviewSet::from_core(&set)).await?;
    Ok(Json(set))
}

/// GET /api/sets
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
) -> Result<Json<SetListResponse>> {
    let sets = state.db.list_sets(&auth.account_id).await?;
    Ok(Json(SetListResponse {
        sets: sets.iter().map(DbReviewSet::to_core).collect(),
    }))
}

/// GET /api/sets/{id}
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Path(set_id): Path<String>,
) -> Result<Json<ReviewSet>> {
    let set = state
        .db
        .get_set(&auth.account_id, &set_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("set {set_id}")))?;
    Ok(Json(set.to_core()))
}

/// PUT /api/sets/{id}
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Path(set_id): Path<String>,
    Json(payload): Json<UpdateSetRequest>,
) -> Result<Json<ReviewSet>> {
    let db_set = state
        .db
        .get_set(&auth.account_id, &set_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("set {set_id}")))?;
    if db_set.user_id != auth.account_id {
        return Err(ApiError::Forbidden("only the owner may edit a set".into()));
    }
    let mut set = db_set.to_core();
    let expected_version = payload.version;

    if let Some(name) = payload.name {
        set.name = name;
    }
    if let Some(description) = payload.description {
        set.description = Some(description);
    }
    if let Some(is_public) = payload.is_public {
        set.is_public = is_public;
    }
    if let Some(shared_with) = payload.shared_with {
        set.shared_with = shared_with;
    }
    set.version = expected_version.max(0) as u64;
    set.touch(Utc::now());

    state
        .db
        .update_set(&DbReviewSet::from_core(&set), expected_version)
        .await?;
    Ok(Json(set))
}

/// POST /api/sets/{id}/items
pub async fn modify_items(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Path(set_id): Path<String>,
    Json(payload): Json<SetItemsRequest>,
) -> Result<Json<ReviewSet>> {
    let updated = state
        .db
        .modify_set_items(&auth.account_id, &set_id, &payload.add, &payload.remove)
        .await?;
    Ok(Json(updated.to_core()))
}

/// DELETE /api/sets/{id}
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Path(set_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.db.delete_set(&auth.account_id, &set_id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
