//! Account types for the renewal engine.
//!
//! An account is one subscriber: a balance, a monthly billing schedule, a
//! status derived from the last billing outcome, and notification preferences.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};
use crate::AccountId;

// ============================================================================
// Constants
// ============================================================================

/// Reminder horizon used when an account has no horizon of its own.
pub const DEFAULT_NOTIFY_BEFORE_DAYS: u8 = 2;

/// Largest accepted reminder horizon, in days.
pub const MAX_NOTIFY_BEFORE_DAYS: u8 = 30;

/// A subscriber account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Stable internal identifier.
    pub id: AccountId,

    /// Display name (used in operator alerts).
    pub name: String,

    /// Messaging delivery address. `None` for ghost accounts that have not
    /// been linked to a messaging identity yet.
    pub messaging_address: Option<String>,

    /// Current balance in cents. May go negative through adjustments.
    pub balance_cents: i64,

    /// First day of the subscription. Its day-of-month is the billing anchor.
    pub start_date: NaiveDate,

    /// Date of the next charge.
    pub next_billing_date: NaiveDate,

    /// Status derived from the last billing outcome or an admin override.
    pub status: AccountStatus,

    /// Notification preferences.
    pub preferences: NotificationPreferences,

    /// Optimistic concurrency version, bumped on every committed mutation.
    pub version: u64,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account whose first charge falls on `start_date`.
    #[must_use]
    pub fn new(name: impl Into<String>, start_date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::generate(),
            name: name.into(),
            messaging_address: None,
            balance_cents: 0,
            start_date,
            next_billing_date: start_date,
            status: AccountStatus::Active,
            preferences: NotificationPreferences::default(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the messaging address.
    #[must_use]
    pub fn with_messaging_address(mut self, address: impl Into<String>) -> Self {
        self.messaging_address = Some(address.into());
        self
    }

    /// Whether the account is not yet linked to a messaging identity.
    #[must_use]
    pub fn is_ghost(&self) -> bool {
        self.messaging_address.is_none()
    }

    /// Day-of-month the schedule aims for when advancing.
    #[must_use]
    pub fn billing_anchor_day(&self) -> u32 {
        self.start_date.day()
    }

    /// Check if the balance covers a charge of `price_cents`.
    #[must_use]
    pub fn has_sufficient_funds(&self, price_cents: i64) -> bool {
        self.balance_cents >= price_cents
    }

    /// Whether the account is below the given price (a debtor).
    #[must_use]
    pub fn is_debtor(&self, price_cents: i64) -> bool {
        self.balance_cents < price_cents
    }

    /// Whether the account is due for a charge on `date`.
    #[must_use]
    pub fn is_due_for_billing(&self, date: NaiveDate) -> bool {
        !self.status.is_blocked() && self.next_billing_date == date
    }

    /// Reminder horizon for this account: its own when set, else `default_days`.
    #[must_use]
    pub fn reminder_horizon(&self, default_days: u8) -> u8 {
        self.preferences.notify_before_days.unwrap_or(default_days)
    }

    /// Whether the account should be reminded on `date` about an upcoming
    /// charge it cannot cover.
    #[must_use]
    pub fn is_due_for_reminder(&self, date: NaiveDate, default_days: u8, price_cents: i64) -> bool {
        if self.status.is_blocked() || !self.is_debtor(price_cents) {
            return false;
        }
        let horizon = u64::from(self.reminder_horizon(default_days));
        date.checked_add_days(Days::new(horizon)) == Some(self.next_billing_date)
    }

    /// Mark the account as modified now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Status of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Last charge succeeded (or no charge attempted yet).
    Active,

    /// Last charge failed for insufficient funds. Still billed on later dates.
    Debt,

    /// Administrative-only state. Never entered or left by the billing engine;
    /// blocked accounts are excluded from billing and reminders.
    Blocked,
}

impl AccountStatus {
    /// Get the status name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Debt => "debt",
            Self::Blocked => "blocked",
        }
    }

    /// Whether this is the administrative-only blocked state.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked)
    }
}

/// Per-account notification preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    /// Whether upcoming-charge reminders are sent.
    pub billing_notifications_enabled: bool,

    /// Reminder horizon in days (0..=30). `None` uses the global default.
    pub notify_before_days: Option<u8>,

    /// Whether a balance warning follows a failed charge.
    pub negative_balance_notifications_enabled: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            billing_notifications_enabled: true,
            notify_before_days: None,
            negative_balance_notifications_enabled: true,
        }
    }
}

impl NotificationPreferences {
    /// Set the reminder horizon, validating its range.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::InvalidPreference` if `days` exceeds
    /// [`MAX_NOTIFY_BEFORE_DAYS`].
    pub fn set_notify_before_days(&mut self, days: Option<u32>) -> Result<()> {
        self.notify_before_days = days.map(validate_horizon).transpose()?;
        Ok(())
    }

    /// Check that the stored horizon is in range.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::InvalidPreference` for an out-of-range horizon.
    pub fn validate(&self) -> Result<()> {
        if let Some(days) = self.notify_before_days {
            validate_horizon(u32::from(days))?;
        }
        Ok(())
    }
}

fn validate_horizon(days: u32) -> Result<u8> {
    u8::try_from(days)
        .ok()
        .filter(|d| *d <= MAX_NOTIFY_BEFORE_DAYS)
        .ok_or(BillingError::InvalidPreference {
            days,
            max: MAX_NOTIFY_BEFORE_DAYS,
        })
}
