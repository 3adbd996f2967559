//! Common test utilities for plutus service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use serde_json::{json, Value};

use plutus_core::UserId;
use plutus_engine::{CreditEngine, EngineConfig};
use plutus_service::{create_router, AppState, ServiceConfig};
use plutus_store::{MemoryKv, MemoryStore};

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// A test user ID.
    pub test_user_id: UserId,
    /// The service API key for service-to-service requests.
    pub service_api_key: String,
}

impl TestHarness {
    /// Create a new test harness on fresh in-memory backends.
    pub fn new() -> Self {
        let service_api_key = "test-service-key".to_string();

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            service_api_key: Some(service_api_key.clone()),
            engine: EngineConfig {
                key_prefix: "test:".into(),
                ..EngineConfig::default()
            },
            ..ServiceConfig::default()
        };

        let engine = CreditEngine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryKv::new()),
            config.engine.clone(),
        );
        let state = AppState::new(Arc::new(engine), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            test_user_id: UserId::generate(),
            service_api_key,
        }
    }

    /// Grant `amount` to the test user, expiring in 30 days.
    pub async fn grant(&self, amount: &str, idempotency_id: &str) -> Value {
        let response = self
            .server
            .post("/v1/credits/grant")
            .add_header("x-api-key", self.service_api_key.clone())
            .json(&json!({
                "user_id": self.test_user_id.to_string(),
                "amount": amount,
                "source_type": "SYSTEM",
                "expires_at": chrono::Utc::now() + chrono::Duration::days(30),
                "idempotency_id": idempotency_id,
            }))
            .await;
        response.assert_status_ok();
        response.json()
    }

    /// Available balance of the test user, as returned on the wire.
    pub async fn available_balance(&self) -> String {
        let response = self
            .server
            .get(&format!(
                "/v1/credits/users/{}/balance",
                self.test_user_id
            ))
            .add_header("x-api-key", self.service_api_key.clone())
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        body["available_balance"]
            .as_str()
            .expect("balance is a string")
            .to_string()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
