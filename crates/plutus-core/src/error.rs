//! Error types for the credit ledger.

use rust_decimal::Decimal;

use crate::freeze::FreezeStatus;
use crate::ids::IdError;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, CreditError>;

/// Errors raised by ledger, session and journal operations.
///
/// Every variant maps to a stable machine-readable code via [`CreditError::code`].
#[derive(Debug, thiserror::Error)]
pub enum CreditError {
    /// Amount is zero or negative.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Grant expiry missing or not in the future.
    #[error("invalid expiration: {0}")]
    InvalidExpiration(String),

    /// Available balance is below the requested amount.
    #[error("insufficient balance: available={available}, required={required}")]
    InsufficientBalance {
        /// Balance available to the operation.
        available: Decimal,
        /// Amount the operation needed.
        required: Decimal,
    },

    /// Idempotency key is claimed but no journal record exists for it.
    #[error("duplicate request: {key}")]
    DuplicateRequest {
        /// The idempotency id that was claimed.
        key: String,
    },

    /// No freeze exists for the session.
    #[error("session not found: {session_id}")]
    SessionNotFound {
        /// The session that was looked up.
        session_id: String,
    },

    /// The session already reached a terminal state.
    #[error("invalid session status: session {session_id} is {status:?}")]
    InvalidSessionStatus {
        /// The session that was addressed.
        session_id: String,
        /// Its current status.
        status: FreezeStatus,
    },

    /// Settlement requested more than the session reserved.
    #[error("settle amount {requested} exceeds reserved amount {reserved}")]
    AmountExceedsReservation {
        /// Amount held by the session.
        reserved: Decimal,
        /// Amount the caller tried to settle.
        requested: Decimal,
    },

    /// No balance summary row exists for the user.
    #[error("user not found: {user_id}")]
    UserNotFound {
        /// The user that was looked up.
        user_id: String,
    },

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Persistence layer failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Cache/lock store failure.
    #[error("cache error: {0}")]
    Cache(String),
}

impl CreditError {
    /// Stable error code exposed to callers.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InvalidId(_) => "INVALID_ID",
            Self::InvalidExpiration(_) => "INVALID_EXPIRATION",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::DuplicateRequest { .. } => "DUPLICATE_REQUEST",
            Self::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            Self::InvalidSessionStatus { .. } => "INVALID_SESSION_STATUS",
            Self::AmountExceedsReservation { .. } => "AMOUNT_EXCEEDS_RESERVATION",
            Self::UserNotFound { .. } => "USER_NOT_FOUND",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
        }
    }

    /// Whether the error was raised by input validation rather than state.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_)
                | Self::InvalidExpiration(_)
                | Self::AmountExceedsReservation { .. }
                | Self::InvalidId(_)
        )
    }
}
