//! Due-date queries.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use renewal_core::{Account, MAX_NOTIFY_BEFORE_DAYS};
use renewal_store::{Store, StoreError};

/// Answers "who is due today" and "who needs a reminder today".
pub struct BillingClock {
    store: Arc<dyn Store>,
}

impl BillingClock {
    /// Create a clock over a store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Non-blocked accounts whose next billing date is exactly `date`.
    ///
    /// Each account appears at most once.
    pub fn due_for_billing(&self, date: NaiveDate) -> Result<Vec<Account>, StoreError> {
        let mut seen = HashSet::new();
        Ok(self
            .store
            .list_accounts_due_on(date)?
            .into_iter()
            .filter(|account| account.is_due_for_billing(date))
            .filter(|account| seen.insert(account.id))
            .collect())
    }

    /// Debtors whose effective reminder horizon lands exactly on `date`.
    ///
    /// An account is selected when its next billing date is `date + h`, `h`
    /// is its own horizon (or `default_days` without a preference), it is
    /// not blocked, and its balance is below `price_cents`.
    pub fn due_for_reminder(
        &self,
        date: NaiveDate,
        default_days: u8,
        price_cents: i64,
    ) -> Result<Vec<Account>, StoreError> {
        let mut seen = HashSet::new();
        let mut due = Vec::new();

        for horizon in 0..=MAX_NOTIFY_BEFORE_DAYS {
            let Some(target) = date.checked_add_days(Days::new(u64::from(horizon))) else {
                break;
            };

            for account in self.store.list_accounts_due_on(target)? {
                if account.reminder_horizon(default_days) == horizon
                    && account.is_due_for_reminder(date, default_days, price_cents)
                    && seen.insert(account.id)
                {
                    due.push(account);
                }
            }
        }

        Ok(due)
    }
}
