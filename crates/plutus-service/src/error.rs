//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use plutus_core::CreditError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Bad request - malformed input rejected before reaching the ledger.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Ledger operation failed.
    #[error(transparent)]
    Credit(#[from] CreditError),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl ApiError {
    /// HTTP status of the error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Credit(err) => match err {
                CreditError::InvalidAmount(_)
                | CreditError::InvalidExpiration(_)
                | CreditError::AmountExceedsReservation { .. }
                | CreditError::InvalidId(_) => StatusCode::BAD_REQUEST,
                CreditError::SessionNotFound { .. } | CreditError::UserNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                CreditError::DuplicateRequest { .. } | CreditError::InvalidSessionStatus { .. } => {
                    StatusCode::CONFLICT
                }
                CreditError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
                CreditError::Storage(_) | CreditError::Cache(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Stable machine-readable code of the error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Credit(err) => err.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, details) = match &self {
            Self::Credit(CreditError::Storage(msg) | CreditError::Cache(msg)) => {
                tracing::error!(error = %msg, code = self.code(), "Internal server error");
                ("An internal error occurred".to_string(), None)
            }
            Self::Credit(CreditError::InsufficientBalance {
                available,
                required,
            }) => (
                self.to_string(),
                Some(serde_json::json!({
                    "available": available,
                    "required": required
                })),
            ),
            Self::Credit(CreditError::AmountExceedsReservation {
                reserved,
                requested,
            }) => (
                self.to_string(),
                Some(serde_json::json!({
                    "reserved": reserved,
                    "requested": requested
                })),
            ),
            Self::BadRequest(msg) => (msg.clone(), None),
            _ => (self.to_string(), None),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code().to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}
