//! Sync API tests.
//!
//! These tests require a running PostgreSQL database; set DATABASE_URL
//! before running them.

mod common;

use axum::http::{header::AUTHORIZATION, StatusCode};
use axum_test::TestServer;

use common::fixtures;
use common::TestContext;

/// Test free-tier accounts cannot reach the sync API.
#[tokio::test]
#[ignore = "requires database"]
async fn test_sync_requires_premium() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (account_id, token) = ctx.create_test_account(false).await;

    let response = server
        .post("/api/sync/push")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&serde_json::json!({ "lists": [], "items": [] }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = server
        .post("/api/sync/pull")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&serde_json::json!({ "since_ms": null }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    ctx.cleanup_account(&account_id).await;
}

/// Test push then pull round-trips records.
#[tokio::test]
#[ignore = "requires database"]
async fn test_push_then_pull() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (account_id, token) = ctx.create_test_account(true).await;

    let push = serde_json::json!({
        "lists": [fixtures::wire_list("list-1", "JLPT N5", 1, 1_750_000_000_000i64)],
        "items": [fixtures::wire_saved_item("item-1", "list-1", 1, 1_750_000_000_000i64)],
    });
    let response = server
        .post("/api/sync/push")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&push)
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["applied"], 2);
    assert_eq!(body["discarded"], 0);

    let response = server
        .post("/api/sync/pull")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&serde_json::json!({ "since_ms": null }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["lists"].as_array().unwrap().len(), 1);
    assert_eq!(body["lists"][0]["name"], "JLPT N5");
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["list_ids"], serde_json::json!(["list-1"]));

    // A pull from after the write sees nothing new.
    let since = body["server_time_ms"].as_i64().unwrap();
    let response = server
        .post("/api/sync/pull")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&serde_json::json!({ "since_ms": since }))
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["lists"].as_array().unwrap().len(), 0);

    ctx.cleanup_account(&account_id).await;
}

/// Test the server keeps the higher version on conflicting pushes.
#[tokio::test]
#[ignore = "requires database"]
async fn test_push_applies_last_writer_wins() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (account_id, token) = ctx.create_test_account(true).await;

    // Device A pushes version 3.
    let response = server
        .post("/api/sync/push")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&serde_json::json!({
            "lists": [fixtures::wire_list("list-1", "newer", 3, 1_750_000_300_000i64)],
        }))
        .await;
    response.assert_status_ok();

    // Device B pushes a stale version 2; the server must discard it.
    let response = server
        .post("/api/sync/push")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&serde_json::json!({
            "lists": [fixtures::wire_list("list-1", "stale", 2, 1_750_000_400_000i64)],
        }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["applied"], 0);
    assert_eq!(body["discarded"], 1);

    let pulled: serde_json::Value = server
        .post("/api/sync/pull")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&serde_json::json!({ "since_ms": null }))
        .await
        .json();
    assert_eq!(pulled["lists"][0]["name"], "newer");
    assert_eq!(pulled["lists"][0]["version"], 3);

    ctx.cleanup_account(&account_id).await;
}

/// Test tombstoned deletions replicate through pull.
#[tokio::test]
#[ignore = "requires database"]
async fn test_deletion_tombstones_replicate() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (account_id, token) = ctx.create_test_account(true).await;

    server
        .post("/api/sync/push")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&serde_json::json!({
            "lists": [fixtures::wire_list("list-1", "doomed", 1, 1_750_000_000_000i64)],
        }))
        .await
        .assert_status_ok();

    let mut deleted = fixtures::wire_list("list-1", "doomed", 2, 1_750_000_100_000i64);
    deleted["deleted"] = serde_json::json!(true);
    server
        .post("/api/sync/push")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&serde_json::json!({ "lists": [deleted] }))
        .await
        .assert_status_ok();

    let pulled: serde_json::Value = server
        .post("/api/sync/pull")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&serde_json::json!({ "since_ms": null }))
        .await
        .json();
    assert_eq!(pulled["lists"][0]["deleted"], true);

    ctx.cleanup_account(&account_id).await;
}

/// Test oversized batches are rejected outright.
#[tokio::test]
#[ignore = "requires database"]
async fn test_push_batch_limit() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (account_id, token) = ctx.create_test_account(true).await;

    let lists: Vec<serde_json::Value> = (0..501)
        .map(|i| fixtures::wire_list(&format!("list-{i}"), "bulk", 1, 1_750_000_000_000i64))
        .collect();
    let response = server
        .post("/api/sync/push")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&serde_json::json!({ "lists": lists }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    ctx.cleanup_account(&account_id).await;
}
