//! Grant, deduction and history integration tests.

mod common;

use common::TestHarness;
use serde_json::{json, Value};

use plutus_core::UserId;

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn ledger_routes_require_api_key() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get(&format!(
            "/v1/credits/users/{}/balance",
            harness.test_user_id
        ))
        .await;
    response.assert_status_unauthorized();

    let response = harness
        .server
        .get(&format!(
            "/v1/credits/users/{}/balance",
            harness.test_user_id
        ))
        .add_header("x-api-key", "wrong-key")
        .await;
    response.assert_status_unauthorized();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

// ============================================================================
// Grant
// ============================================================================

#[tokio::test]
async fn grant_then_replay_returns_same_record() {
    let harness = TestHarness::new();

    let first = harness.grant("100", "welcome").await;
    assert_eq!(first["type"], "GRANT");
    assert_eq!(first["amount"], "100");

    let second = harness.grant("100", "welcome").await;
    assert_eq!(first, second);
    assert_eq!(harness.available_balance().await, "100");
}

#[tokio::test]
async fn grant_rejects_non_positive_amount() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/credits/grant")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "amount": "0",
            "source_type": "SYSTEM",
            "idempotency_id": "zero",
        }))
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "INVALID_AMOUNT");
}

#[tokio::test]
async fn grant_rejects_malformed_user_id() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/credits/grant")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({
            "user_id": "not-a-uuid",
            "amount": "5",
            "source_type": "SYSTEM",
            "expires_at": chrono::Utc::now() + chrono::Duration::days(1),
            "idempotency_id": "g",
        }))
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn batch_grant_isolates_bad_items() {
    let harness = TestHarness::new();
    let other = UserId::generate();
    let expires_at = chrono::Utc::now() + chrono::Duration::days(30);

    let response = harness
        .server
        .post("/v1/credits/grant/batch")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({
            "items": [
                {
                    "user_id": harness.test_user_id.to_string(),
                    "amount": "10",
                    "source_type": "ACTIVITY",
                    "expires_at": expires_at,
                    "idempotency_id": "b1",
                },
                {
                    "user_id": other.to_string(),
                    "amount": "-5",
                    "source_type": "ACTIVITY",
                    "expires_at": expires_at,
                    "idempotency_id": "b2",
                },
            ]
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success_count"], 1);
    assert_eq!(body["fail_count"], 1);
    assert_eq!(body["fail_results"][0]["error_code"], "INVALID_AMOUNT");
    assert_eq!(harness.available_balance().await, "10");
}

// ============================================================================
// Deduct
// ============================================================================

#[tokio::test]
async fn deduct_reduces_balance() {
    let harness = TestHarness::new();
    harness.grant("50", "g").await;

    let response = harness
        .server
        .post("/v1/credits/deduct")
        .add_header("x-api-key", harness.service_api_key.clone())
        .add_header("x-service-name", "chat")
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "amount": "20",
            "source_type": "CHAT",
            "source_id": "conversation-1",
            "idempotency_id": "d1",
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["type"], "CONSUME");
    assert_eq!(harness.available_balance().await, "30");
}

#[tokio::test]
async fn deduct_beyond_balance_is_payment_required() {
    let harness = TestHarness::new();
    harness.grant("5", "g").await;

    let response = harness
        .server
        .post("/v1/credits/deduct")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "amount": "6",
            "source_type": "CHAT",
            "idempotency_id": "d1",
        }))
        .await;

    response.assert_status(axum::http::StatusCode::PAYMENT_REQUIRED);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "INSUFFICIENT_BALANCE");
    assert_eq!(body["error"]["details"]["available"], "5");
}

// ============================================================================
// Balance and history
// ============================================================================

#[tokio::test]
async fn balance_of_unknown_user_is_zero() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get(&format!("/v1/credits/users/{}/balance", UserId::generate()))
        .add_header("x-api-key", harness.service_api_key.clone())
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["available_balance"], "0");
    assert_eq!(body["total_balance"], "0");
}

#[tokio::test]
async fn transactions_are_paginated() {
    let harness = TestHarness::new();
    for i in 0..3 {
        harness.grant("1", &format!("g{i}")).await;
    }

    let response = harness
        .server
        .get(&format!(
            "/v1/credits/users/{}/transactions",
            harness.test_user_id
        ))
        .add_query_param("page", 0)
        .add_query_param("size", 2)
        .add_header("x-api-key", harness.service_api_key.clone())
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["total"], 3);
    assert_eq!(body["size"], 2);
    assert_eq!(body["transactions"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["transactions"][0]["transaction_id"], "g2");
}
