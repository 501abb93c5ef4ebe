pub mod db;
pub mod error;
pub mod metrics;
pub mod models;
pub mod retry;
pub mod routes;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::db::Database;
use crate::metrics::MetricsRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
}

/// Build the full API router for the given state.
pub fn build_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        // Account routes
        .route("/api/account/status", get(routes::account::status))
        // Item routes
        .route("/api/items", get(routes::items::list))
        .route("/api/items", post(routes::items::create))
        .route("/api/items/stats", get(routes::items::stats))
        .route("/api/items/{id}", get(routes::items::get))
        .route("/api/items/{id}", put(routes::items::update))
        .route("/api/items/{id}", delete(routes::items::deactivate))
        .route("/api/items/{id}/purge", delete(routes::items::purge))
        .route("/api/items/{id}/review", post(routes::items::review))
        // Set routes
        .route("/api/sets", get(routes::sets::list))
        .route("/api/sets", post(routes::sets::create))
        .route("/api/sets/{id}", get(routes::sets::get))
        .route("/api/sets/{id}", put(routes::sets::update))
        .route("/api/sets/{id}", delete(routes::sets::delete))
        .route("/api/sets/{id}/items", post(routes::sets::modify_items))
        // Session routes
        .route("/api/sessions", get(routes::sessions::list))
        .route("/api/sessions", post(routes::sessions::start))
        .route("/api/sessions/{id}", get(routes::sessions::get))
        .route("/api/sessions/{id}/results", post(routes::sessions::record_result))
        .route("/api/sessions/{id}/pause", post(routes::sessions::pause))
        .route("/api/sessions/{id}/resume", post(routes::sessions::resume))
        .route("/api/sessions/{id}/complete", post(routes::sessions::complete))
        // Sync routes (premium-gated in the handlers)
        .route("/api/sync/push", post(routes::sync::push))
        .route("/api/sync/pull", post(routes::sync::pull))
        // Admin routes
        .route("/api/admin/metrics", get(routes::admin::metrics))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            routes::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/account/register", post(routes::account::register))
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let metrics = Arc::new(MetricsRegistry::default());

    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url, metrics).await?;

    tracing::info!("Running migrations...");
    db.run_migrations().await?;

    let state = AppState { db: Arc::new(db) };
    let app = build_router(state);

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
