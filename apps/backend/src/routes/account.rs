//! Account endpoints

use axum::{extract::State, Extension, Json};
use review_core::LevelTable;

use crate::error::{ApiError, Result};
use crate::models::{RegisterRequest, RegisterResponse, StatusResponse};
use crate::routes::auth::AuthenticatedAccount;
use crate::AppState;

/// POST /api/account/register
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>> {
    let account = state.db.create_account(payload.display_name.as_deref()).await?;
    tracing::info!(account_id = %account.id, "registered account");
    Ok(Json(RegisterResponse {
        account_id: account.id,
        token: account.token,
    }))
}

/// GET /api/account/status
pub async fn status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
) -> Result<Json<StatusResponse>> {
    let account = state
        .db
        .get_account(&auth.account_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("account {}", auth.account_id)))?;

    let level = LevelTable::new().user_level(account.total_xp.max(0) as u64);

    Ok(Json(StatusResponse {
        account_id: account.id,
        display_name: account.display_name,
        is_premium: account.is_premium,
        total_xp: account.total_xp,
        level: level.level,
        title: level.title.to_string(),
        xp_to_next_level: level.xp_to_next_level,
        progress_percentage: level.progress_percentage,
    }))
}
