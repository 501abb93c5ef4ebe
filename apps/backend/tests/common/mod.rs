//! Common test utilities and fixtures for integration tests.
//!
//! # Requirements
//! Integration tests require a PostgreSQL database (set DATABASE_URL).
//! Tests that need them create premium/admin accounts directly in the
//! database, the same way the billing webhook and ops tooling would.

pub mod fixtures;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;

use kioku_backend::db::Database;
use kioku_backend::metrics::MetricsRegistry;
use kioku_backend::{build_router, AppState};

/// Test context containing database connection and the API router.
pub struct TestContext {
    pub db: Arc<Database>,
    app: Router,
}

impl TestContext {
    /// Create a new test context.
    ///
    /// # Panics
    /// Panics if DATABASE_URL is not set or database connection fails.
    pub async fn new() -> Self {
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");

        let metrics = Arc::new(MetricsRegistry::default());
        let db = Database::connect(&database_url, metrics)
            .await
            .expect("Failed to connect to test database");

        db.run_migrations().await.expect("Failed to run migrations");

        let db = Arc::new(db);
        let app = build_router(AppState { db: db.clone() });

        Self { db, app }
    }

    /// Get the router for use with axum-test.
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Create a test account, returning (account_id, token).
    pub async fn create_test_account(&self, premium: bool) -> (String, String) {
        let account = self
            .db
            .create_account(Some("test account"))
            .await
            .expect("Failed to create test account");
        if premium {
            self.db
                .set_premium(&account.id, true)
                .await
                .expect("Failed to set premium");
        }
        (account.id, account.token)
    }

    /// Grant admin rights to a test account.
    pub async fn make_admin(&self, account_id: &str) {
        sqlx::query("UPDATE accounts SET is_admin = TRUE WHERE id = $1")
            .bind(account_id)
            .execute(self.db.pool())
            .await
            .expect("Failed to grant admin");
    }

    /// Remove a test account and everything cascading from it.
    pub async fn cleanup_account(&self, account_id: &str) {
        sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(account_id)
            .execute(self.db.pool())
            .await
            .expect("Failed to clean up test account");
    }

    /// Authorization header value for a token.
    pub fn auth_header_value(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {token}")).expect("valid header value")
    }
}
