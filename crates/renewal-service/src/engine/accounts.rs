//! Account administration.
//!
//! Balance changes go through the ledger and are committed together with
//! their transaction; everything else is a direct field update. All writes
//! take the account lock first.

use chrono::{NaiveDate, Utc};
use renewal_core::{
    ledger, Account, AccountId, AccountStatus, BillingError, BillingSettings,
    Notification, NotificationKind, NotificationPreferences, PaymentDetails, Transaction,
    TransactionKind,
};
use serde::Deserialize;

use super::{BillingEngine, EngineError, Result};

/// Input for creating an account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    /// Display name.
    pub name: String,
    /// First billing date; also fixes the billing anchor day.
    pub start_date: NaiveDate,
    /// Messaging address, absent for ghost accounts.
    #[serde(default)]
    pub messaging_address: Option<String>,
    /// Opening balance, recorded as a deposit when positive.
    #[serde(default)]
    pub initial_balance_cents: i64,
}

/// Replacement notification preferences.
#[derive(Debug, Clone, Deserialize)]
pub struct PreferencesInput {
    /// Send billing outcome messages and reminders.
    pub billing_notifications_enabled: bool,
    /// Reminder horizon in days; `None` follows the global default.
    #[serde(default)]
    pub notify_before_days: Option<u32>,
    /// Send a balance warning after a failed charge.
    pub negative_balance_notifications_enabled: bool,
}

/// Partial settings update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    /// New subscription price.
    #[serde(default)]
    pub subscription_price_cents: Option<i64>,
    /// Payment detail fields to overwrite.
    #[serde(default)]
    pub payment_details: Option<PaymentDetails>,
}

impl BillingEngine {
    /// Create an account due first on its start date.
    ///
    /// A positive opening balance is recorded as a deposit and written in the
    /// same store operation as the account itself.
    ///
    /// # Errors
    ///
    /// - `BillingError::InvalidAmount` for a negative opening balance.
    /// - `StoreError::AddressInUse` if another account owns the address.
    pub async fn create_account(&self, input: NewAccount) -> Result<Account> {
        if input.initial_balance_cents < 0 {
            return Err(BillingError::InvalidAmount(format!(
                "opening balance must not be negative, got {}",
                input.initial_balance_cents
            ))
            .into());
        }

        let mut account = Account::new(input.name, input.start_date);
        account.messaging_address = input.messaging_address;
        let opening = if input.initial_balance_cents > 0 {
            Some(ledger::adjust(
                &mut account,
                input.initial_balance_cents,
                TransactionKind::Deposit,
                "Opening balance".into(),
            )?)
        } else {
            None
        };
        self.store.insert_account(&account, opening.as_ref())?;

        tracing::info!(
            account_id = %account.id,
            start_date = %account.start_date,
            balance_cents = account.balance_cents,
            ghost = account.is_ghost(),
            "Account created"
        );

        Ok(account)
    }

    /// Load an account.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::AccountNotFound` for an unknown id.
    pub fn account(&self, account_id: AccountId) -> Result<Account> {
        self.store
            .get_account(&account_id)?
            .ok_or_else(|| EngineError::account_not_found(account_id))
    }

    /// Move money through the ledger: a deposit or a signed adjustment.
    ///
    /// # Errors
    ///
    /// - `BillingError::AccountNotFound` for an unknown id.
    /// - `BillingError::InvalidAmount` for an amount the kind does not allow.
    pub async fn adjust_balance(
        &self,
        account_id: AccountId,
        amount_cents: i64,
        kind: TransactionKind,
        memo: String,
    ) -> Result<(Account, Transaction)> {
        let _guard = self.locks.acquire(account_id).await;

        let mut account = self.account(account_id)?;
        let transaction = ledger::adjust(&mut account, amount_cents, kind, memo)?;
        let account = self.store.commit_account(&account, Some(&transaction))?;

        tracing::info!(
            account_id = %account_id,
            amount_cents,
            kind = kind.as_str(),
            balance_cents = account.balance_cents,
            "Balance adjusted"
        );

        Ok((account, transaction))
    }

    /// Link a ghost account (or relink an account) to a messaging address.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AddressInUse` if another account owns the address.
    pub async fn link_address(&self, account_id: AccountId, address: String) -> Result<Account> {
        let _guard = self.locks.acquire(account_id).await;

        let mut account = self.account(account_id)?;
        account.messaging_address = Some(address);
        account.touch();
        let account = self.store.commit_account(&account, None)?;

        tracing::info!(account_id = %account_id, "Messaging address linked");

        Ok(account)
    }

    /// Replace notification preferences.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::InvalidPreference` for a horizon above 30 days.
    pub async fn update_preferences(
        &self,
        account_id: AccountId,
        input: PreferencesInput,
    ) -> Result<Account> {
        let mut preferences = NotificationPreferences {
            billing_notifications_enabled: input.billing_notifications_enabled,
            negative_balance_notifications_enabled: input.negative_balance_notifications_enabled,
            ..NotificationPreferences::default()
        };
        preferences.set_notify_before_days(input.notify_before_days)?;

        let _guard = self.locks.acquire(account_id).await;

        let mut account = self.account(account_id)?;
        account.preferences = preferences;
        account.touch();

        Ok(self.store.commit_account(&account, None)?)
    }

    /// Administrative status override, the only way in or out of `blocked`.
    pub async fn set_status(&self, account_id: AccountId, status: AccountStatus) -> Result<Account> {
        let _guard = self.locks.acquire(account_id).await;

        let mut account = self.account(account_id)?;
        let from = account.status;
        account.status = status;
        account.touch();
        let account = self.store.commit_account(&account, None)?;

        tracing::info!(
            account_id = %account_id,
            from = from.as_str(),
            to = status.as_str(),
            "Account status overridden"
        );

        Ok(account)
    }

    /// Ledger entries of an account, newest first.
    pub fn transactions(
        &self,
        account_id: AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        self.account(account_id)?;
        Ok(self
            .store
            .list_transactions_by_account(&account_id, limit, offset)?)
    }

    /// Accounts whose balance is below the current price, lowest first.
    pub fn debtors(&self, include_ghosts: bool) -> Result<Vec<Account>> {
        let price_cents = self.settings_snapshot()?.subscription_price_cents;

        let mut debtors: Vec<Account> = self
            .store
            .list_accounts()?
            .into_iter()
            .filter(|account| account.is_debtor(price_cents))
            .filter(|account| include_ghosts || !account.is_ghost())
            .collect();
        debtors.sort_by_key(|account| account.balance_cents);

        Ok(debtors)
    }

    /// Apply a partial settings update and store it.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::InvalidPrice` for a negative price.
    pub fn update_settings(&self, update: SettingsUpdate) -> Result<BillingSettings> {
        let mut settings = self.settings_snapshot()?;
        if let Some(price) = update.subscription_price_cents {
            settings.set_price(price)?;
        }
        if let Some(details) = update.payment_details {
            settings.payment_details.merge(details);
        }
        settings.updated_at = Utc::now();
        self.store.put_settings(&settings)?;

        tracing::info!(
            price_cents = settings.subscription_price_cents,
            "Billing settings updated"
        );

        Ok(settings)
    }

    /// Persist a notification and try to deliver it right away.
    ///
    /// A failed delivery leaves it unsent for the sweep.
    pub async fn notify(
        &self,
        account_id: AccountId,
        message: String,
        kind: NotificationKind,
    ) -> Result<(Notification, bool)> {
        let notification = self.outbox.enqueue(account_id, message, kind)?;
        let report = self
            .outbox
            .dispatch(&*self.channel, vec![notification.id], 1)
            .await;
        let delivered = report.delivered.contains(&notification.id);
        Ok((notification, delivered))
    }
}
