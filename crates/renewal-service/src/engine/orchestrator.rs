//! Daily billing, reminder and sweep runs.

use chrono::NaiveDate;
use renewal_core::{
    ledger, status, Account, AccountId, BillingSettings, ChargeResult, NotificationId,
    NotificationKind, SUBSCRIPTION_CHARGE_MEMO,
};
use serde::Serialize;
use tokio::sync::watch;

use super::{messages, BillingEngine, DeliveryReport, Result};

/// A per-account error that did not stop the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountFailure {
    /// The affected account.
    pub account_id: AccountId,
    /// What went wrong.
    pub error: String,
}

/// Summary of one daily billing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingRunReport {
    /// Billing date of the run.
    pub date: NaiveDate,
    /// Price snapshot used for every charge in the run.
    pub price_cents: i64,
    /// Accounts selected as due.
    pub due: usize,
    /// Successfully charged.
    pub charged: Vec<AccountId>,
    /// Charge attempted but the balance was insufficient.
    pub insufficient: Vec<AccountId>,
    /// No longer due when re-checked under the account lock.
    pub skipped: Vec<AccountId>,
    /// Accounts that hit an error.
    pub errors: Vec<AccountFailure>,
    /// Post-run delivery of the run's notifications.
    pub delivery: DeliveryReport,
}

/// Summary of one reminder check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderRunReport {
    /// Date of the check.
    pub date: NaiveDate,
    /// Accounts whose horizon landed on the date.
    pub candidates: usize,
    /// Accounts a reminder was queued for.
    pub reminded: Vec<AccountId>,
    /// Accounts that hit an error.
    pub errors: Vec<AccountFailure>,
    /// Post-run delivery of the reminders.
    pub delivery: DeliveryReport,
}

struct Billed {
    account: Account,
    result: ChargeResult,
}

impl BillingEngine {
    /// Charge every account due on `date`.
    ///
    /// The price is read once at the start. Each account is charged under
    /// its lock after re-checking that it is still due, so re-running the
    /// same date charges nobody twice. Outcome messages are persisted to the
    /// outbox during the loop and dispatched concurrently once the loop is
    /// done.
    ///
    /// # Errors
    ///
    /// Store failures abort the run. Everything else is recorded per account.
    pub async fn run_daily_billing(&self, date: NaiveDate) -> Result<BillingRunReport> {
        let settings = self.settings_snapshot()?;
        let price_cents = settings.subscription_price_cents;
        let due = self.clock.due_for_billing(date)?;

        tracing::info!(%date, due = due.len(), price_cents, "Starting daily billing run");

        let mut report = BillingRunReport {
            date,
            price_cents,
            due: due.len(),
            charged: Vec::new(),
            insufficient: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
            delivery: DeliveryReport::default(),
        };
        let mut queued = Vec::new();

        for account in due {
            let account_id = account.id;

            let billed = match self.bill_account(account_id, date, price_cents).await {
                Ok(Some(billed)) => billed,
                Ok(None) => {
                    report.skipped.push(account_id);
                    continue;
                }
                Err(e) if e.is_store_failure() => {
                    tracing::error!(account_id = %account_id, error = %e, "Store failure, aborting billing run");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(account_id = %account_id, error = %e, "Billing failed for account");
                    report.errors.push(AccountFailure {
                        account_id,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if billed.result.success {
                report.charged.push(account_id);
            } else {
                report.insufficient.push(account_id);
            }

            match self.queue_billing_messages(&billed, &settings) {
                Ok(ids) => queued.extend(ids),
                Err(e) if e.is_store_failure() => return Err(e),
                Err(e) => {
                    tracing::warn!(account_id = %account_id, error = %e, "Could not queue billing messages");
                    report.errors.push(AccountFailure {
                        account_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        report.delivery = self
            .outbox
            .dispatch(&*self.channel, queued, self.config.delivery_concurrency)
            .await;

        tracing::info!(
            %date,
            charged = report.charged.len(),
            insufficient = report.insufficient.len(),
            skipped = report.skipped.len(),
            errors = report.errors.len(),
            delivered = report.delivery.delivered.len(),
            "Daily billing run finished"
        );

        Ok(report)
    }

    /// Charge one account if it is still due; `None` when it no longer is.
    async fn bill_account(
        &self,
        account_id: AccountId,
        date: NaiveDate,
        price_cents: i64,
    ) -> Result<Option<Billed>> {
        let _guard = self.locks.acquire(account_id).await;

        let Some(mut account) = self.store.get_account(&account_id)? else {
            return Ok(None);
        };
        if !account.is_due_for_billing(date) {
            tracing::debug!(account_id = %account_id, "Account no longer due, skipping");
            return Ok(None);
        }

        let outcome = ledger::charge(&mut account, price_cents, SUBSCRIPTION_CHARGE_MEMO)?;
        let change = status::transition(&mut account, &outcome.result);

        let account = if outcome.transaction.is_some() || change.changed() {
            self.store
                .commit_account(&account, outcome.transaction.as_ref())?
        } else {
            account
        };

        if outcome.result.success {
            tracing::info!(
                account_id = %account_id,
                balance_cents = account.balance_cents,
                next_billing_date = %account.next_billing_date,
                "Subscription charged"
            );
        } else {
            tracing::info!(
                account_id = %account_id,
                balance_cents = account.balance_cents,
                from = change.from.as_str(),
                to = change.to.as_str(),
                "Insufficient funds"
            );
        }

        Ok(Some(Billed {
            account,
            result: outcome.result,
        }))
    }

    fn queue_billing_messages(
        &self,
        billed: &Billed,
        settings: &BillingSettings,
    ) -> Result<Vec<NotificationId>> {
        let account = &billed.account;
        let price_cents = settings.subscription_price_cents;
        let mut ids = Vec::new();

        let kind = if billed.result.success {
            NotificationKind::BillingSuccess
        } else {
            NotificationKind::BillingFailure
        };
        let text = messages::billing_outcome(&billed.result, price_cents, settings);
        ids.push(self.outbox.enqueue(account.id, text, kind)?.id);

        if billed.result.success {
            return Ok(ids);
        }

        if account.preferences.negative_balance_notifications_enabled {
            let text = messages::balance_warning(account, settings);
            ids.push(
                self.outbox
                    .enqueue(account.id, text, NotificationKind::BalanceWarning)?
                    .id,
            );
        }

        let alert = messages::debtor_alert(account);
        for address in &self.config.operator_addresses {
            ids.push(self.outbox.enqueue_operator(address, alert.clone())?.id);
        }

        Ok(ids)
    }

    /// Queue and deliver reminders for debtors whose horizon lands on `date`.
    ///
    /// Reminders carry no de-duplication: running twice for the same date
    /// reminds twice. Accounts without a messaging address or with billing
    /// notifications disabled are not reminded.
    ///
    /// # Errors
    ///
    /// Store failures abort the run.
    pub async fn run_reminder_check(&self, date: NaiveDate) -> Result<ReminderRunReport> {
        let settings = self.settings_snapshot()?;
        let default_days = self.config.default_reminder_days;
        let candidates = self.clock.due_for_reminder(
            date,
            default_days,
            settings.subscription_price_cents,
        )?;

        tracing::info!(%date, candidates = candidates.len(), "Starting reminder check");

        let mut report = ReminderRunReport {
            date,
            candidates: candidates.len(),
            reminded: Vec::new(),
            errors: Vec::new(),
            delivery: DeliveryReport::default(),
        };
        let mut queued = Vec::new();

        for account in &candidates {
            if account.is_ghost() || !account.preferences.billing_notifications_enabled {
                continue;
            }

            let text = messages::reminder(account, account.reminder_horizon(default_days), &settings);
            match self.outbox.enqueue(account.id, text, NotificationKind::Reminder) {
                Ok(notification) => {
                    queued.push(notification.id);
                    report.reminded.push(account.id);
                }
                Err(e) if e.is_store_failure() => return Err(e),
                Err(e) => {
                    tracing::warn!(account_id = %account.id, error = %e, "Could not queue reminder");
                    report.errors.push(AccountFailure {
                        account_id: account.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        report.delivery = self
            .outbox
            .dispatch(&*self.channel, queued, self.config.delivery_concurrency)
            .await;

        tracing::info!(
            %date,
            reminded = report.reminded.len(),
            delivered = report.delivery.delivered.len(),
            "Reminder check finished"
        );

        Ok(report)
    }

    /// Deliver every pending notification.
    ///
    /// # Errors
    ///
    /// Store failures abort the sweep.
    pub async fn run_outbox_sweep(
        &self,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Result<DeliveryReport> {
        self.outbox
            .deliver_pending(&*self.channel, None, shutdown)
            .await
    }

    /// Deliver pending notifications of one account, e.g. after linking it.
    pub async fn deliver_pending_for(&self, account_id: &AccountId) -> Result<DeliveryReport> {
        self.outbox
            .deliver_pending(&*self.channel, Some(account_id), None)
            .await
    }

    /// Best-effort alert to every operator, bypassing the store.
    ///
    /// Used when the store itself failed, so the alert cannot be persisted.
    pub async fn alert_operators_directly(&self, text: &str) {
        for address in &self.config.operator_addresses {
            let sent = tokio::time::timeout(
                self.config.delivery_timeout,
                self.channel.send(address, text),
            )
            .await;

            match sent {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(operator = %address, error = %e, "Operator alert failed");
                }
                Err(_) => {
                    tracing::warn!(operator = %address, "Operator alert timed out");
                }
            }
        }
    }
}
