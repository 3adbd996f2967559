//! API handlers.

pub mod credits;
pub mod health;
pub mod sessions;

use plutus_core::{SessionId, UserId};

use crate::error::ApiError;

/// Parse a user id from a path or body.
fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid user ID".into()))
}

/// Parse a session id from a path.
fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid session ID".into()))
}
