//! Headless one-shot sync runner.
//!
//! Reconciles the local store with the backend and flushes any queued
//! pushes. Configuration comes from the environment:
//! - KIOKU_SERVER_URL (default http://localhost:3000)
//! - KIOKU_DATA_DIR   (default <platform data dir>/kioku)
//! - KIOKU_TOKEN      (bearer token; omit for guest/local-only mode)
//! - KIOKU_USER_ID
//! - KIOKU_PREMIUM    (set to 1 when the account has premium sync)

use kioku_client::{open_store, CloudSync, StudyListManager, SyncConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server_url =
        std::env::var("KIOKU_SERVER_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let data_dir = std::env::var("KIOKU_DATA_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("kioku")
        });

    let store = open_store(&data_dir);
    let cloud = CloudSync::new(SyncConfig::new(server_url));

    let user_id = std::env::var("KIOKU_USER_ID").ok();
    if let (Ok(token), Some(user_id)) = (std::env::var("KIOKU_TOKEN"), user_id.as_deref()) {
        let premium = std::env::var("KIOKU_PREMIUM").map(|v| v == "1").unwrap_or(false);
        cloud.initialize(user_id, &token, premium);
    }

    let manager = StudyListManager::new(store, cloud.clone(), user_id.as_deref());

    if !cloud.is_enabled() {
        tracing::info!("sync disabled (guest or free tier); local data left as-is");
        return Ok(());
    }

    let stats = manager.reconcile().await?;
    tracing::info!(pulled = stats.pulled, pushed = stats.pushed, "reconciled");

    let flushed = manager.flush_pending().await?;
    if flushed > 0 {
        tracing::info!(flushed, "flushed queued pushes");
    }

    Ok(())
}
