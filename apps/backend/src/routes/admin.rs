//! Admin-only observability endpoints

use std::collections::BTreeMap;

use axum::{extract::State, Extension, Json};

use crate::error::Result;
use crate::metrics::MetricSummary;
use crate::routes::auth::AuthenticatedAccount;
use crate::AppState;

/// GET /api/admin/metrics
pub async fn metrics(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAccount>,
) -> Result<Json<BTreeMap<String, MetricSummary>>> {
    auth.require_admin()?;
    Ok(Json(state.db.metrics().summaries()))
}
