//! PostgreSQL database operations

pub mod items;
pub mod sessions;
pub mod sets;
pub mod sync;

use std::future::Future;
use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::metrics::MetricsRegistry;
use crate::models::Account;
use crate::retry::{with_retry, RetryPolicy};

/// Database wrapper with connection pool, retry policy, and metrics sink
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    metrics: Arc<MetricsRegistry>,
    retry: RetryPolicy,
}

impl Database {
    /// Connect to PostgreSQL and create connection pool
    pub async fn connect(database_url: &str, metrics: Arc<MetricsRegistry>) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        Ok(Self {
            pool,
            metrics,
            retry: RetryPolicy::default(),
        })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ApiError::Migration(e.to_string()))?;
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Run a database operation with bounded retry and metrics recording.
    pub(crate) async fn run<T, F, Fut>(&self, name: &'static str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        with_retry(&self.retry, &self.metrics, name, ApiError::is_transient, op).await
    }

    // === Account Repository ===

    /// Create a new account with a generated bearer token
    pub async fn create_account(&self, display_name: Option<&str>) -> Result<Account> {
        let pool = self.pool.clone();
        let id = Uuid::new_v4().to_string();
        let token = Uuid::new_v4().to_string();
        let display_name = display_name.map(|s| s.to_string());
        self.run("accounts.create", move || {
            let pool = pool.clone();
            let id = id.clone();
            let token = token.clone();
            let display_name = display_name.clone();
            async move {
                let account = sqlx::query_as::<_, Account>(
                    r#"
                    INSERT INTO accounts (id, token, display_name)
                    VALUES ($1, $2, $3)
                    RETURNING id, token, display_name, is_premium, is_admin,
                              total_xp, created_at, last_seen_at
                    "#,
                )
                .bind(&id)
                .bind(&token)
                .bind(&display_name)
                .fetch_one(&pool)
                .await?;
                Ok(account)
            }
        })
        .await
    }

    /// Get account by bearer token
    pub async fn get_account_by_token(&self, token: &str) -> Result<Option<Account>> {
        let pool = self.pool.clone();
        let token = token.to_string();
        self.run("accounts.get_by_token", move || {
            let pool = pool.clone();
            let token = token.clone();
            async move {
                let account = sqlx::query_as::<_, Account>(
                    r#"
                    SELECT id, token, display_name, is_premium, is_admin,
                           total_xp, created_at, last_seen_at
                    FROM accounts
                    WHERE token = $1
                    "#,
                )
                .bind(&token)
                .fetch_optional(&pool)
                .await?;
                Ok(account)
            }
        })
        .await
    }

    /// Get account by id
    pub async fn get_account(&self, account_id: &str) -> Result<Option<Account>> {
        let pool = self.pool.clone();
        let account_id = account_id.to_string();
        self.run("accounts.get", move || {
            let pool = pool.clone();
            let account_id = account_id.clone();
            async move {
                let account = sqlx::query_as::<_, Account>(
                    r#"
                    SELECT id, token, display_name, is_premium, is_admin,
                           total_xp, created_at, last_seen_at
                    FROM accounts
                    WHERE id = $1
                    "#,
                )
                .bind(&account_id)
                .fetch_optional(&pool)
                .await?;
                Ok(account)
            }
        })
        .await
    }

    /// Update account last_seen_at timestamp
    pub async fn touch_last_seen(&self, account_id: &str) -> Result<()> {
        let pool = self.pool.clone();
        let account_id = account_id.to_string();
        self.run("accounts.touch_last_seen", move || {
            let pool = pool.clone();
            let account_id = account_id.clone();
            async move {
                sqlx::query("UPDATE accounts SET last_seen_at = NOW() WHERE id = $1")
                    .bind(&account_id)
                    .execute(&pool)
                    .await?;
                Ok(())
            }
        })
        .await
    }

    /// Flip the premium entitlement (billing webhook / admin action)
    pub async fn set_premium(&self, account_id: &str, is_premium: bool) -> Result<()> {
        let pool = self.pool.clone();
        let account_id = account_id.to_string();
        self.run("accounts.set_premium", move || {
            let pool = pool.clone();
            let account_id = account_id.clone();
            async move {
                let result = sqlx::query("UPDATE accounts SET is_premium = $2 WHERE id = $1")
                    .bind(&account_id)
                    .bind(is_premium)
                    .execute(&pool)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(ApiError::NotFound(format!("account {account_id}")));
                }
                Ok(())
            }
        })
        .await
    }

    /// Add XP to an account, returning the new lifetime total
    pub async fn add_xp(&self, account_id: &str, delta: i64) -> Result<i64> {
        let pool = self.pool.clone();
        let account_id = account_id.to_string();
        self.run("accounts.add_xp", move || {
            let pool = pool.clone();
            let account_id = account_id.clone();
            async move {
                let row: (i64,) = sqlx::query_as(
                    "UPDATE accounts SET total_xp = total_xp + $2 WHERE id = $1 RETURNING total_xp",
                )
                .bind(&account_id)
                .bind(delta)
                .fetch_optional(&pool)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("account {account_id}")))?;
                Ok(row.0)
            }
        })
        .await
    }
}
