//! Ledger entry types.
//!
//! Every balance change writes exactly one immutable [`Transaction`]. Entries
//! are append-only and never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, TransactionId};

/// An immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID (ULID for time-ordering).
    pub id: TransactionId,

    /// The account whose balance was affected.
    pub account_id: AccountId,

    /// Signed amount in cents. Negative = charge.
    pub amount_cents: i64,

    /// Kind of entry.
    pub kind: TransactionKind,

    /// Balance after this entry (in cents).
    pub balance_after_cents: i64,

    /// Free-text memo.
    pub memo: String,

    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    fn new(
        account_id: AccountId,
        amount_cents: i64,
        kind: TransactionKind,
        balance_after_cents: i64,
        memo: String,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            account_id,
            amount_cents,
            kind,
            balance_after_cents,
            memo,
            created_at: Utc::now(),
        }
    }

    /// Create a subscription charge. The stored amount is always negative.
    #[must_use]
    pub fn withdrawal(
        account_id: AccountId,
        amount_cents: i64,
        balance_after_cents: i64,
        memo: String,
    ) -> Self {
        Self::new(
            account_id,
            -amount_cents.abs(),
            TransactionKind::Withdrawal,
            balance_after_cents,
            memo,
        )
    }

    /// Create a manually recorded incoming payment.
    #[must_use]
    pub fn deposit(
        account_id: AccountId,
        amount_cents: i64,
        balance_after_cents: i64,
        memo: String,
    ) -> Self {
        Self::new(
            account_id,
            amount_cents,
            TransactionKind::Deposit,
            balance_after_cents,
            memo,
        )
    }

    /// Create an administrative correction of either sign.
    #[must_use]
    pub fn adjustment(
        account_id: AccountId,
        amount_cents: i64,
        balance_after_cents: i64,
        memo: String,
    ) -> Self {
        Self::new(
            account_id,
            amount_cents,
            TransactionKind::Adjustment,
            balance_after_cents,
            memo,
        )
    }
}

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Funds received out-of-band and recorded manually.
    Deposit,

    /// Recurring subscription charge.
    Withdrawal,

    /// Administrative correction.
    Adjustment,
}

impl TransactionKind {
    /// Get the kind name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Adjustment => "adjustment",
        }
    }
}
