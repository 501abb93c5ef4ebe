//! Review item endpoints

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use uuid::Uuid;

use review_core::types::{ContentType, Priority, ReviewItem};
use review_core::SrsScheduler;

use crate::error::{ApiError, Result};
use crate::models::{
    CreateItemRequest, DbReviewItem, ItemListQuery, ItemListResponse, ItemStatsResponse,
    ReviewRequest, UpdateItemRequest,
};
use crate::routes::auth::AuthenticatedAccount;
use crate::AppState;

/// POST /api/items
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Json(payload): Json<CreateItemRequest>,
) -> Result<Json<ReviewItem>> {
    let content_type = ContentType::from_str(&payload.content_type)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown content type: {}", payload.content_type)))?;
    let priority = match payload.priority.as_deref() {
        Some(p) => Priority::from_str(p)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown priority: {p}")))?,
        None => Priority::default(),
    };

    let now = Utc::now();
    let mut item = ReviewItem::new(
        &auth.account_id,
        content_type,
        payload.content_id,
        payload.primary_text,
        Uuid::new_v4().to_string(),
        now,
    );
    item.secondary_text = payload.secondary_text;
    item.tertiary_text = payload.tertiary_text;
    item.audio_url = payload.audio_url;
    item.image_url = payload.image_url;
    item.tags = payload.tags;
    item.priority = priority;

    state.db.insert_item(&DbReviewItem::from_core(&item)).await?;
    Ok(Json(item))
}

/// GET /api/items
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Query(query): Query<ItemListQuery>,
) -> Result<Json<ItemListResponse>> {
    let (items, next_cursor) = state.db.list_items(&auth.account_id, &query).await?;
    Ok(Json(ItemListResponse {
        items: items.iter().map(DbReviewItem::to_core).collect(),
        next_cursor,
    }))
}

/// GET /api/items/{id}
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Path(item_id): Path<String>,
) -> Result<Json<ReviewItem>> {
    let item = state
        .db
        .get_item(&auth.account_id, &item_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("item {item_id}")))?;
    Ok(Json(item.to_core()))
}

/// PUT /api/items/{id}
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Path(item_id): Path<String>,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<Json<ReviewItem>> {
    let db_item = state
        .db
        .get_item(&auth.account_id, &item_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("item {item_id}")))?;
    let mut item = db_item.to_core();

    // The caller's read version is the optimistic check, not the stored one.
    let expected_version = payload.version;

    let now = Utc::now();
    if let Some(text) = payload.primary_text {
        item.primary_text = text;
    }
    if let Some(text) = payload.secondary_text {
        item.secondary_text = Some(text);
    }
    if let Some(text) = payload.tertiary_text {
        item.tertiary_text = Some(text);
    }
    if let Some(url) = payload.audio_url {
        item.audio_url = Some(url);
    }
    if let Some(url) = payload.image_url {
        item.image_url = Some(url);
    }
    if let Some(tags) = payload.tags {
        item.tags = tags;
    }
    if let Some(priority) = payload.priority {
        item.priority = Priority::from_str(&priority)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown priority: {priority}")))?;
    }
    if let Some(pinned) = payload.pinned {
        item.pinned_at = if pinned { Some(now) } else { None };
    }

    item.version = expected_version.max(0) as u64;
    item.touch(now);

    state
        .db
        .update_item(&DbReviewItem::from_core(&item), expected_version)
        .await?;
    Ok(Json(item))
}

/// DELETE /api/items/{id} (soft-deactivate)
pub async fn deactivate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Path(item_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.db.deactivate_item(&auth.account_id, &item_id).await?;
    Ok(Json(serde_json::json!({ "deactivated": true })))
}

/// DELETE /api/items/{id}/purge (admin-only hard delete)
pub async fn purge(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Path(item_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    auth.require_admin()?;
    state.db.delete_item(&auth.account_id, &item_id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// POST /api/items/{id}/review
pub async fn review(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Path(item_id): Path<String>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<ReviewItem>> {
    let db_item = state
        .db
        .get_item(&auth.account_id, &item_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("item {item_id}")))?;
    let mut item = db_item.to_core();
    let expected_version = item.version as i64;

    let now = Utc::now();
    let scheduler = SrsScheduler::default();
    let outcome = scheduler.next(
        &item.schedule(),
        payload.correct,
        payload.response_quality,
        now,
    );
    let status_before = item.status;
    item.stats.record(payload.correct, payload.response_ms);
    item.apply_outcome(&outcome, now);

    state
        .db
        .update_item(&DbReviewItem::from_core(&item), expected_version)
        .await?;

    // Keep denormalized progress on containing sets current.
    if item.status != status_before {
        for set_id in &item.set_ids {
            state.db.refresh_set_progress(&auth.account_id, set_id).await?;
        }
    }

    Ok(Json(item))
}

/// GET /api/items/stats
///
/// Aggregates are reduced in application code from the fetched item set.
pub async fn stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
) -> Result<Json<ItemStatsResponse>> {
    let items = state.db.items_for_stats(&auth.account_id).await?;
    let now = Utc::now();
    let end_of_today = now
        .date_naive()
        .and_hms_opt(23, 59, 59)
        .expect("valid time")
        .and_utc();

    let (reviews, correct) = items.iter().fold((0u64, 0u64), |(r, c), item| {
        (r + item.review_count.max(0) as u64, c + item.correct_count.max(0) as u64)
    });
    let accuracy = if reviews == 0 {
        0.0
    } else {
        correct as f64 / reviews as f64
    };
    let due_today = items
        .iter()
        .filter(|i| i.next_review_at <= end_of_today)
        .count();

    Ok(Json(ItemStatsResponse {
        total_items: items.len(),
        accuracy,
        due_today,
    }))
}
