//! Session API tests.
//!
//! These tests require a running PostgreSQL database; set DATABASE_URL
//! before running them.

mod common;

use axum::http::{header::AUTHORIZATION, StatusCode};
use axum_test::TestServer;

use common::fixtures;
use common::TestContext;

/// Test a full session lifecycle: start, results, complete, XP.
#[tokio::test]
#[ignore = "requires database"]
async fn test_session_lifecycle_awards_xp_once() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (account_id, token) = ctx.create_test_account(false).await;

    let session: serde_json::Value = server
        .post("/api/sessions")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&fixtures::start_session_request(2))
        .await
        .json();
    let session_id = session["id"].as_str().unwrap().to_string();
    assert_eq!(session["is_completed"], false);

    for (correct, ms) in [(true, 1200), (false, 4000)] {
        let response = server
            .post(&format!("/api/sessions/{session_id}/results"))
            .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
            .json(&fixtures::session_result("item-1", correct, ms))
            .await;
        response.assert_status_ok();
    }

    let response = server
        .post(&format!("/api/sessions/{session_id}/complete"))
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["session"]["is_completed"], true);
    assert_eq!(body["session"]["accuracy"], 0.5);
    assert_eq!(body["session"]["correct_items"], 1);
    assert_eq!(body["session"]["incorrect_items"], 1);
    // XP granted exactly once on completion.
    assert!(body["xp"]["session_xp"].as_u64().unwrap() > 0);

    // Completing again is a domain violation, so no second award path.
    let response = server
        .post(&format!("/api/sessions/{session_id}/complete"))
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let status: serde_json::Value = server
        .get("/api/account/status")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await
        .json();
    assert_eq!(
        status["total_xp"].as_u64().unwrap(),
        body["xp"]["total_xp"].as_u64().unwrap()
    );

    ctx.cleanup_account(&account_id).await;
}

/// Test pausing excludes paused time from the final duration.
#[tokio::test]
#[ignore = "requires database"]
async fn test_pause_and_resume() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (account_id, token) = ctx.create_test_account(false).await;

    let session: serde_json::Value = server
        .post("/api/sessions")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .json(&fixtures::start_session_request(1))
        .await
        .json();
    let session_id = session["id"].as_str().unwrap().to_string();

    server
        .post(&format!("/api/sessions/{session_id}/pause"))
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await
        .assert_status_ok();

    // Pausing twice is rejected.
    let response = server
        .post(&format!("/api/sessions/{session_id}/pause"))
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let resumed: serde_json::Value = server
        .post(&format!("/api/sessions/{session_id}/resume"))
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await
        .json();
    assert!(resumed["paused_at"].is_null());
    assert!(resumed["paused_ms"].as_i64().unwrap() >= 0);

    ctx.cleanup_account(&account_id).await;
}

/// Test session history pagination.
#[tokio::test]
#[ignore = "requires database"]
async fn test_session_listing_paginates() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (account_id, token) = ctx.create_test_account(false).await;

    for _ in 0..3 {
        server
            .post("/api/sessions")
            .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
            .json(&fixtures::start_session_request(1))
            .await
            .assert_status_ok();
    }

    let page: serde_json::Value = server
        .get("/api/sessions?limit=2")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await
        .json();
    assert_eq!(page["sessions"].as_array().unwrap().len(), 2);
    let cursor = page["next_cursor"].as_str().unwrap().to_string();

    let rest: serde_json::Value = server
        .get(&format!("/api/sessions?limit=2&cursor={cursor}"))
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await
        .json();
    assert_eq!(rest["sessions"].as_array().unwrap().len(), 1);
    assert!(rest["next_cursor"].is_null());

    ctx.cleanup_account(&account_id).await;
}

/// Test admin metrics endpoint gating and content.
#[tokio::test]
#[ignore = "requires database"]
async fn test_admin_metrics_gated() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (account_id, token) = ctx.create_test_account(false).await;

    let response = server
        .get("/api/admin/metrics")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    ctx.make_admin(&account_id).await;
    let response = server
        .get("/api/admin/metrics")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    // The auth lookups above have already produced samples.
    assert!(body.get("accounts.get_by_token").is_some());

    ctx.cleanup_account(&account_id).await;
}
