//! Column families of the `RocksDB` backend.

/// Column family names.
pub mod cf {
    /// Ledger entries, keyed by `ledger_id` (8 bytes BE).
    pub const LEDGER_ENTRIES: &str = "ledger_entries";

    /// Index: entries by user in FIFO order,
    /// keyed by `user_id || expires_at || ledger_id`. Empty values.
    pub const LEDGER_BY_USER: &str = "ledger_by_user";

    /// Freezes, keyed by `session_id`.
    pub const FREEZES: &str = "freezes";

    /// Index: freezes by user, keyed by `user_id || session_id`. Empty values.
    pub const FREEZES_BY_USER: &str = "freezes_by_user";

    /// Journal records, keyed by `record_id` (8 bytes BE).
    pub const TRANSACTIONS: &str = "transactions";

    /// Unique index: `transaction_id` to `record_id`.
    pub const TRANSACTIONS_BY_TXID: &str = "transactions_by_txid";

    /// Index: records by user, keyed by `user_id || record_id`. Empty values.
    pub const TRANSACTIONS_BY_USER: &str = "transactions_by_user";

    /// Index: records by source, keyed by `source_id || 0x00 || record_id`.
    pub const TRANSACTIONS_BY_SOURCE: &str = "transactions_by_source";

    /// Consumption details, keyed by `transaction_id || 0x00 || ledger_id`.
    pub const CONSUMPTION_DETAILS: &str = "consumption_details";

    /// Balance summaries, keyed by `user_id`.
    pub const SUMMARIES: &str = "summaries";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::LEDGER_ENTRIES,
        cf::LEDGER_BY_USER,
        cf::FREEZES,
        cf::FREEZES_BY_USER,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_TXID,
        cf::TRANSACTIONS_BY_USER,
        cf::TRANSACTIONS_BY_SOURCE,
        cf::CONSUMPTION_DETAILS,
        cf::SUMMARIES,
    ]
}
