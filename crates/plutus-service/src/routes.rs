//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{credits, health, sessions};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for session endpoints.
/// Sessions are opened and settled once per metered call, so they see the
/// most traffic.
const SESSION_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Credits (Service API Key auth)
/// - `POST /v1/credits/grant` - Grant credit
/// - `POST /v1/credits/grant/batch` - Grant credit to many users
/// - `POST /v1/credits/deduct` - Deduct credit
/// - `GET /v1/credits/users/:user_id/balance` - Available balance
/// - `GET /v1/credits/users/:user_id/transactions` - Journal history
///
/// ## Sessions (Service API Key auth, rate-limited)
/// - `POST /v1/sessions/start` - Reserve credit
/// - `GET /v1/sessions/:session_id` - Session state
/// - `POST /v1/sessions/:session_id/settle` - Consume the final amount
/// - `POST /v1/sessions/:session_id/cancel` - Release the hold
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let session_routes = Router::new()
        .route("/start", post(sessions::start_session))
        .route("/:session_id", get(sessions::get_session))
        .route("/:session_id/settle", post(sessions::settle_session))
        .route("/:session_id/cancel", post(sessions::cancel_session))
        .layer(ConcurrencyLimitLayer::new(SESSION_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        .route("/credits/grant", post(credits::grant))
        .route("/credits/grant/batch", post(credits::grant_batch))
        .route("/credits/deduct", post(credits::deduct))
        .route("/credits/users/:user_id/balance", get(credits::get_balance))
        .route(
            "/credits/users/:user_id/transactions",
            get(credits::list_transactions),
        )
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS))
        .nest("/sessions", session_routes);

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
