//! Credit session handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use plutus_core::{Decimal, Freeze, TransactionRecord};
use plutus_engine::SessionStart;

use super::{parse_session_id, parse_user_id};
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Session start request body.
#[derive(Debug, Deserialize)]
pub struct StartSessionBody {
    /// Owner of the session.
    pub user_id: String,
    /// Amount to hold.
    pub max_amount: Decimal,
    /// Caller idempotency id.
    pub idempotency_id: String,
}

/// Settlement request body.
#[derive(Debug, Deserialize)]
pub struct SettleSessionBody {
    /// Amount actually used.
    pub final_amount: Decimal,
}

/// Reserve credit for a new session.
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<StartSessionBody>,
) -> Result<Json<SessionStart>, ApiError> {
    tracing::debug!(
        service = %auth.service_name,
        user_id = %body.user_id,
        idempotency_id = %body.idempotency_id,
        "Starting session"
    );

    let user_id = parse_user_id(&body.user_id)?;
    let session = state
        .engine
        .start_session(user_id, body.max_amount, &body.idempotency_id)?;
    Ok(Json(session))
}

/// Current state of a session.
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(session_id): Path<String>,
) -> Result<Json<Freeze>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    Ok(Json(state.engine.get_session(&session_id)?))
}

/// Settle a session.
pub async fn settle_session(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(session_id): Path<String>,
    Json(body): Json<SettleSessionBody>,
) -> Result<Json<TransactionRecord>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    tracing::debug!(
        service = %auth.service_name,
        session_id = %session_id,
        final_amount = %body.final_amount,
        "Settling session"
    );

    let record = state.engine.settle_session(&session_id, body.final_amount)?;
    Ok(Json(record))
}

/// Cancel a session and release its hold.
pub async fn cancel_session(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(session_id): Path<String>,
) -> Result<Json<Freeze>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    tracing::debug!(
        service = %auth.service_name,
        session_id = %session_id,
        "Cancelling session"
    );

    state.engine.cancel_session(&session_id)?;
    Ok(Json(state.engine.get_session(&session_id)?))
}
