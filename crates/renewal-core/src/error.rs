//! Error types for the renewal engine.

use chrono::NaiveDate;

use crate::ids::IdError;
use crate::AccountId;

/// Result type for core billing operations.
pub type Result<T> = std::result::Result<T, BillingError>;

/// Errors that can occur in core billing operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BillingError {
    /// Account not found.
    #[error("account not found: {account_id}")]
    AccountNotFound {
        /// The account that was not found.
        account_id: AccountId,
    },

    /// A negative subscription price was supplied.
    #[error("invalid price: {price_cents} (must be >= 0)")]
    InvalidPrice {
        /// The rejected price in cents.
        price_cents: i64,
    },

    /// A reminder horizon outside the accepted range.
    #[error("invalid notification preference: notify_before_days={days} (expected 0..={max})")]
    InvalidPreference {
        /// The rejected horizon.
        days: u32,
        /// The largest accepted horizon.
        max: u8,
    },

    /// A ledger adjustment with an amount not allowed for its kind.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The next billing date cannot be represented.
    #[error("cannot advance billing date {from} by one month")]
    DateOverflow {
        /// The date that failed to advance.
        from: NaiveDate,
    },

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
