//! Account status state machine.
//!
//! Only a billing attempt moves an account between `active` and `debt`.
//! `blocked` belongs to administrators: the machine never enters it and never
//! leaves it.

use serde::Serialize;

use crate::ledger::ChargeResult;
use crate::{Account, AccountStatus};

/// A status transition produced by a billing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    /// Status before the attempt.
    pub from: AccountStatus,
    /// Status after the attempt.
    pub to: AccountStatus,
}

impl StatusChange {
    /// Whether the status actually changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Status that follows `current` after a charge with `result`.
#[must_use]
pub fn next_status(current: AccountStatus, result: &ChargeResult) -> AccountStatus {
    match (current, result.success) {
        (AccountStatus::Blocked, _) => AccountStatus::Blocked,
        (_, true) => AccountStatus::Active,
        (_, false) => AccountStatus::Debt,
    }
}

/// Apply the transition for `result` to `account`.
pub fn transition(account: &mut Account, result: &ChargeResult) -> StatusChange {
    let from = account.status;
    let to = next_status(from, result);
    if from != to {
        account.status = to;
        account.touch();
    }
    StatusChange { from, to }
}
