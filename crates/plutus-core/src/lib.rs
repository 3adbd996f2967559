//! Core types for the plutus credit ledger.
//!
//! This crate provides the foundational types shared by the store, engine
//! and service crates:
//!
//! - **Identifiers**: `UserId`, `SessionId`, storage row ids
//! - **Ledger**: `LedgerEntry`, `LedgerStatus`, `SourceType`
//! - **Sessions**: `Freeze`, `FreezeStatus`
//! - **Journal**: `TransactionRecord`, `TransactionType`, `ConsumptionDetail`
//! - **Summary**: `UserBalanceSummary`
//! - **Errors**: `CreditError` with stable error codes
//!
//! # Amounts
//!
//! Credit amounts are exact decimals (`rust_decimal::Decimal`) and are
//! serialized as strings so no precision is lost on the wire.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod freeze;
pub mod ids;
pub mod journal;
pub mod ledger;
pub mod source;
pub mod summary;

pub use error::{CreditError, Result};
pub use freeze::{Freeze, FreezeStatus};
pub use ids::{
    generate_transaction_id, FreezeId, IdError, LedgerId, RecordId, SessionId, UserId,
    UNASSIGNED_ID,
};
pub use journal::{ConsumptionDetail, TransactionRecord, TransactionType};
pub use ledger::{LedgerEntry, LedgerStatus};
pub use rust_decimal::Decimal;
pub use source::SourceType;
pub use summary::UserBalanceSummary;
