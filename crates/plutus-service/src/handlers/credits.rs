//! Grant, deduction, balance and history handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use plutus_core::{Decimal, SourceType, TransactionRecord};
use plutus_engine::{BatchGrantResult, DeductRequest, GrantRequest, TransactionPage};

use super::parse_user_id;
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Largest number of items accepted in one batch grant.
const MAX_BATCH_ITEMS: usize = 1000;

/// Grant request body.
#[derive(Debug, Deserialize)]
pub struct GrantBody {
    /// Recipient.
    pub user_id: String,
    /// Amount to grant.
    pub amount: Decimal,
    /// What produced the grant.
    pub source_type: SourceType,
    /// Caller reference.
    #[serde(default)]
    pub source_id: Option<String>,
    /// Expiry; required and strictly in the future.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Caller idempotency id.
    pub idempotency_id: String,
}

impl GrantBody {
    fn into_request(self) -> Result<GrantRequest, ApiError> {
        Ok(GrantRequest {
            user_id: parse_user_id(&self.user_id)?,
            amount: self.amount,
            source_type: self.source_type,
            source_id: self.source_id,
            expires_at: self.expires_at,
            idempotency_id: self.idempotency_id,
        })
    }
}

/// Batch grant request body.
#[derive(Debug, Deserialize)]
pub struct BatchGrantBody {
    /// Items to grant.
    pub items: Vec<GrantBody>,
}

/// Deduction request body.
#[derive(Debug, Deserialize)]
pub struct DeductBody {
    /// User being charged.
    pub user_id: String,
    /// Amount to deduct.
    pub amount: Decimal,
    /// What the charge is for.
    pub source_type: SourceType,
    /// Caller reference.
    #[serde(default)]
    pub source_id: Option<String>,
    /// Caller idempotency id.
    pub idempotency_id: String,
}

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// The user.
    pub user_id: String,
    /// Spendable credit: unexpired ledger credit minus active holds.
    pub available_balance: Decimal,
    /// Running total of remaining ledger credit.
    pub total_balance: Decimal,
}

/// History query parameters.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Zero-based page index.
    #[serde(default)]
    pub page: usize,
    /// Page size.
    pub size: Option<usize>,
}

/// Grant credit to a user.
pub async fn grant(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<GrantBody>,
) -> Result<Json<TransactionRecord>, ApiError> {
    tracing::debug!(
        service = %auth.service_name,
        user_id = %body.user_id,
        idempotency_id = %body.idempotency_id,
        "Processing grant"
    );

    let record = state.engine.grant(body.into_request()?)?;
    Ok(Json(record))
}

/// Grant credit to many users.
pub async fn grant_batch(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<BatchGrantBody>,
) -> Result<Json<BatchGrantResult>, ApiError> {
    if body.items.len() > MAX_BATCH_ITEMS {
        return Err(ApiError::BadRequest(format!(
            "Batch exceeds {MAX_BATCH_ITEMS} items"
        )));
    }
    tracing::debug!(
        service = %auth.service_name,
        items = body.items.len(),
        "Processing batch grant"
    );

    let requests = body
        .items
        .into_iter()
        .map(GrantBody::into_request)
        .collect::<Result<Vec<_>, _>>()?;
    let result = state.engine.grant_batch(&requests)?;
    Ok(Json(result))
}

/// Deduct credit from a user.
pub async fn deduct(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<DeductBody>,
) -> Result<Json<TransactionRecord>, ApiError> {
    tracing::debug!(
        service = %auth.service_name,
        user_id = %body.user_id,
        idempotency_id = %body.idempotency_id,
        "Processing deduction"
    );

    let request = DeductRequest {
        user_id: parse_user_id(&body.user_id)?,
        amount: body.amount,
        source_type: body.source_type,
        source_id: body.source_id,
        idempotency_id: body.idempotency_id,
    };
    let record = state.engine.deduct(request)?;
    Ok(Json(record))
}

/// Get a user's balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;

    let available_balance = state.engine.available_balance(&user_id)?;
    let total_balance = state
        .engine
        .summary(&user_id)?
        .map_or(Decimal::ZERO, |s| s.total_balance);

    Ok(Json(BalanceResponse {
        user_id: user_id.to_string(),
        available_balance,
        total_balance,
    }))
}

/// List a user's journal, newest first.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<TransactionPage>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let page = state
        .engine
        .transaction_history(&user_id, query.page, query.size)?;
    Ok(Json(page))
}
