//! Bearer-token authentication middleware

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::{ApiError, Result};
use crate::AppState;

/// Identity attached to every authenticated request
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount {
    pub account_id: String,
    pub is_premium: bool,
    pub is_admin: bool,
}

impl AuthenticatedAccount {
    /// Guard for premium-only operations (cloud sync).
    pub fn require_premium(&self) -> Result<()> {
        if self.is_premium {
            Ok(())
        } else {
            Err(ApiError::Forbidden("premium subscription required".into()))
        }
    }

    /// Guard for admin-only operations (metrics, hard deletes).
    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("admin privileges required".into()))
        }
    }
}

/// Resolve the bearer token to an account and stamp last-seen.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?
        .to_string();

    let account = state
        .db
        .get_account_by_token(&token)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("unknown token".into()))?;

    state.db.touch_last_seen(&account.id).await?;

    request.extensions_mut().insert(AuthenticatedAccount {
        account_id: account.id,
        is_premium: account.is_premium,
        is_admin: account.is_admin,
    });

    Ok(next.run(request).await)
}
