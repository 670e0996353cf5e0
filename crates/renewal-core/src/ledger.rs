//! The ledger: the only code that moves money.
//!
//! Functions here are pure with respect to storage: they mutate an in-memory
//! [`Account`] and return the [`Transaction`] to persist with it. The caller
//! commits both atomically.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::advance_one_month;
use crate::error::{BillingError, Result};
use crate::settings::validate_price;
use crate::{Account, Transaction, TransactionKind};

/// Memo recorded on subscription charges.
pub const SUBSCRIPTION_CHARGE_MEMO: &str = "Monthly subscription charge";

/// Outcome of a charge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeResult {
    /// Whether the balance covered the price.
    pub success: bool,

    /// The advanced billing date (success only).
    pub new_due_date: Option<NaiveDate>,

    /// Balance after the attempt, in cents.
    pub new_balance_cents: i64,
}

/// A charge result together with the entry to persist.
#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    /// What happened.
    pub result: ChargeResult,

    /// The withdrawal entry; present exactly when the charge succeeded.
    pub transaction: Option<Transaction>,
}

/// Charge the subscription price against an account.
///
/// On success the balance is debited, the billing date advances one month
/// (see [`crate::calendar`]) and a withdrawal entry is returned. On
/// insufficient funds nothing is mutated and no entry is produced. The status
/// is left to [`crate::status::transition`].
///
/// The ledger does not deduplicate: charging the same account twice debits
/// it twice.
///
/// # Errors
///
/// - `BillingError::InvalidPrice` if `price_cents < 0`.
/// - `BillingError::DateOverflow` if the next billing date cannot be computed.
/// - `BillingError::InvalidAmount` if the debit would overflow the balance.
pub fn charge(account: &mut Account, price_cents: i64, memo: &str) -> Result<ChargeOutcome> {
    validate_price(price_cents)?;

    if !account.has_sufficient_funds(price_cents) {
        return Ok(ChargeOutcome {
            result: ChargeResult {
                success: false,
                new_due_date: None,
                new_balance_cents: account.balance_cents,
            },
            transaction: None,
        });
    }

    // Compute everything fallible before mutating.
    let new_due_date = advance_one_month(account.next_billing_date, account.billing_anchor_day())?;
    let new_balance = account
        .balance_cents
        .checked_sub(price_cents)
        .ok_or_else(|| BillingError::InvalidAmount("balance underflow".into()))?;

    account.balance_cents = new_balance;
    account.next_billing_date = new_due_date;
    account.touch();

    let transaction = Transaction::withdrawal(account.id, price_cents, new_balance, memo.into());

    Ok(ChargeOutcome {
        result: ChargeResult {
            success: true,
            new_due_date: Some(new_due_date),
            new_balance_cents: new_balance,
        },
        transaction: Some(transaction),
    })
}

/// Record a manual balance change (incoming payment or correction).
///
/// Deposits must be positive; adjustments may have either sign but not be
/// zero. Withdrawals are produced only by [`charge`].
///
/// # Errors
///
/// Returns `BillingError::InvalidAmount` for an amount not allowed for `kind`
/// or a balance overflow.
pub fn adjust(
    account: &mut Account,
    amount_cents: i64,
    kind: TransactionKind,
    memo: String,
) -> Result<Transaction> {
    match kind {
        TransactionKind::Deposit if amount_cents <= 0 => {
            return Err(BillingError::InvalidAmount(format!(
                "deposit must be positive, got {amount_cents}"
            )));
        }
        TransactionKind::Adjustment if amount_cents == 0 => {
            return Err(BillingError::InvalidAmount(
                "adjustment must be non-zero".into(),
            ));
        }
        TransactionKind::Withdrawal => {
            return Err(BillingError::InvalidAmount(
                "withdrawals are only recorded by subscription charges".into(),
            ));
        }
        _ => {}
    }

    let new_balance = account
        .balance_cents
        .checked_add(amount_cents)
        .ok_or_else(|| BillingError::InvalidAmount("balance overflow".into()))?;

    account.balance_cents = new_balance;
    account.touch();

    Ok(match kind {
        TransactionKind::Deposit => Transaction::deposit(account.id, amount_cents, new_balance, memo),
        _ => Transaction::adjustment(account.id, amount_cents, new_balance, memo),
    })
}
