//! Item API tests.
//!
//! These tests require a running PostgreSQL database; set DATABASE_URL
//! before running them.

mod common;

use axum::http::{header::AUTHORIZATION, StatusCode};
use axum_test::TestServer;

use common::fixtures;
use common::TestContext;

/// Test item creation and retrieval.
#[tokio::test]
#[ignore = "requires database"]
async fn test_create_and_get_item() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (account_id, token) = ctx.create_test_account(false).await;

    let response = server
        .post("/api/items")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&fixtures::create_item_request("vocabulary", "はなす"))
        .await;
    response.assert_status_ok();
    let created: serde_json::Value = response.json();
    assert_eq!(created["status"], "new");
    assert_eq!(created["interval_days"], 0);
    assert_eq!(created["ease_factor"], 2.5);
    assert_eq!(created["version"], 1);

    let item_id = created["id"].as_str().unwrap();
    let response = server
        .get(&format!("/api/items/{item_id}"))
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await;
    response.assert_status_ok();
    let fetched: serde_json::Value = response.json();
    assert_eq!(fetched["primary_text"], "はなす");

    ctx.cleanup_account(&account_id).await;
}

/// Test three consecutive correct reviews follow the growth curve.
#[tokio::test]
#[ignore = "requires database"]
async fn test_review_growth_curve() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (account_id, token) = ctx.create_test_account(false).await;

    let created: serde_json::Value = server
        .post("/api/items")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&fixtures::create_item_request("vocabulary", "たべる"))
        .await
        .json();
    let item_id = created["id"].as_str().unwrap();

    let mut intervals = Vec::new();
    for _ in 0..3 {
        let response = server
            .post(&format!("/api/items/{item_id}/review"))
            .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
            .json(&serde_json::json!({ "correct": true, "response_ms": 1500 }))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        intervals.push(body["interval_days"].as_u64().unwrap());
    }

    assert_eq!(intervals, vec![1, 6, 15]);

    let response = server
        .get(&format!("/api/items/{item_id}"))
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["repetitions"], 3);
    assert_eq!(body["status"], "learning");
    assert!(body["ease_factor"].as_f64().unwrap() <= 2.5);
    assert_eq!(body["review_count"], 3);
    assert_eq!(body["current_streak"], 3);

    ctx.cleanup_account(&account_id).await;
}

/// Test a stale version on update is rejected as a conflict.
#[tokio::test]
#[ignore = "requires database"]
async fn test_stale_update_conflicts() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (account_id, token) = ctx.create_test_account(false).await;

    let created: serde_json::Value = server
        .post("/api/items")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&fixtures::create_item_request("kanji", "水"))
        .await
        .json();
    let item_id = created["id"].as_str().unwrap();

    // First writer wins at version 1.
    let response = server
        .put(&format!("/api/items/{item_id}"))
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&serde_json::json!({ "version": 1, "primary_text": "水曜日" }))
        .await;
    response.assert_status_ok();

    // Second writer still holds version 1 and must be rejected.
    let response = server
        .put(&format!("/api/items/{item_id}"))
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&serde_json::json!({ "version": 1, "primary_text": "氷" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    ctx.cleanup_account(&account_id).await;
}

/// Test deactivated items drop out of listings but stay readable.
#[tokio::test]
#[ignore = "requires database"]
async fn test_deactivate_hides_from_listing() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (account_id, token) = ctx.create_test_account(false).await;

    let created: serde_json::Value = server
        .post("/api/items")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&fixtures::create_item_request("kana", "あ"))
        .await
        .json();
    let item_id = created["id"].as_str().unwrap();

    server
        .delete(&format!("/api/items/{item_id}"))
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await
        .assert_status_ok();

    let listing: serde_json::Value = server
        .get("/api/items")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await
        .json();
    assert!(listing["items"]
        .as_array()
        .unwrap()
        .iter()
        .all(|i| i["id"] != *item_id));

    // Still present, soft-deactivated.
    let fetched: serde_json::Value = server
        .get(&format!("/api/items/{item_id}"))
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await
        .json();
    assert_eq!(fetched["is_active"], false);

    ctx.cleanup_account(&account_id).await;
}

/// Test requests without a token are rejected.
#[tokio::test]
#[ignore = "requires database"]
async fn test_missing_token_is_unauthorized() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let response = server.get("/api/items").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

/// Test set membership is maintained on both sides and cleaned up on
/// set deletion.
#[tokio::test]
#[ignore = "requires database"]
async fn test_set_membership_cascade() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (account_id, token) = ctx.create_test_account(false).await;

    let item: serde_json::Value = server
        .post("/api/items")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&fixtures::create_item_request("vocabulary", "のむ"))
        .await
        .json();
    let item_id = item["id"].as_str().unwrap().to_string();

    let set: serde_json::Value = server
        .post("/api/sets")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&serde_json::json!({ "name": "N5 verbs" }))
        .await
        .json();
    let set_id = set["id"].as_str().unwrap().to_string();

    let updated: serde_json::Value = server
        .post(&format!("/api/sets/{set_id}/items"))
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&serde_json::json!({ "add": [item_id] }))
        .await
        .json();
    assert_eq!(updated["item_count"], 1);
    assert_eq!(updated["progress"]["new"], 1);
    assert_eq!(updated["content_types"], serde_json::json!(["vocabulary"]));

    let fetched: serde_json::Value = server
        .get(&format!("/api/items/{item_id}"))
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await
        .json();
    assert_eq!(fetched["set_ids"], serde_json::json!([set_id]));

    // Deleting the set strips the reference from the item.
    server
        .delete(&format!("/api/sets/{set_id}"))
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await
        .assert_status_ok();

    let fetched: serde_json::Value = server
        .get(&format!("/api/items/{item_id}"))
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await
        .json();
    assert_eq!(fetched["set_ids"], serde_json::json!([]));

    ctx.cleanup_account(&account_id).await;
}
