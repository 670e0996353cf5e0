//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary account records, keyed by `account_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Index: accounts by next billing date, keyed by `date || account_id`.
    /// Value is empty (index only).
    pub const ACCOUNTS_BY_DUE_DATE: &str = "accounts_by_due_date";

    /// Index: messaging address to `account_id`.
    pub const ACCOUNTS_BY_ADDRESS: &str = "accounts_by_address";

    /// Ledger entries, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: ledger entries by account, keyed by `account_id || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTIONS_BY_ACCOUNT: &str = "transactions_by_account";

    /// Outbox entries, keyed by `notification_id` (ULID).
    pub const NOTIFICATIONS: &str = "notifications";

    /// Index: unsent outbox entries, keyed by `notification_id`.
    /// Removed in the same batch that marks the entry sent.
    pub const PENDING_NOTIFICATIONS: &str = "pending_notifications";

    /// Singleton records such as billing settings.
    pub const SETTINGS: &str = "settings";
}

/// Key of the billing settings record in [`cf::SETTINGS`].
pub const BILLING_SETTINGS_KEY: &[u8] = b"billing";

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::ACCOUNTS_BY_DUE_DATE,
        cf::ACCOUNTS_BY_ADDRESS,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_ACCOUNT,
        cf::NOTIFICATIONS,
        cf::PENDING_NOTIFICATIONS,
        cf::SETTINGS,
    ]
}
