//! Plutus HTTP API Service.
//!
//! This crate exposes the credit ledger engine over HTTP:
//!
//! - Credit grants, batch grants and synchronous deductions
//! - Balance and journal queries
//! - Credit sessions (start, settle, cancel)
//!
//! # Authentication
//!
//! Every `/v1` route requires the `X-API-Key` header to match the configured
//! service API key. Callers may identify themselves with `X-Service-Name`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Ledger calls are synchronous

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::{ServiceConfig, StorageBackend};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
