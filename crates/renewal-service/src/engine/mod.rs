//! The billing engine.
//!
//! [`BillingEngine`] wires the store, the delivery channel and the
//! per-account locks together and exposes the three periodic jobs (daily
//! billing, reminder check, outbox sweep) plus the account administration
//! operations used by the HTTP surface.
//!
//! Every ledger mutation follows the same shape: take the account lock,
//! reload the account, apply the pure domain operation from `renewal_core`,
//! and commit account and transaction together with a version check.

mod accounts;
mod clock;
mod locks;
pub mod messages;
mod orchestrator;
mod outbox;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use renewal_core::{
    AccountId, BillingError, BillingSettings, PaymentDetails, DEFAULT_NOTIFY_BEFORE_DAYS,
    DEFAULT_SUBSCRIPTION_PRICE_CENTS,
};
use renewal_store::{Store, StoreError};

use crate::channel::{DeliveryChannel, DeliveryError};

pub use accounts::{NewAccount, PreferencesInput, SettingsUpdate};
pub use clock::BillingClock;
pub use locks::AccountLocks;
pub use orchestrator::{AccountFailure, BillingRunReport, ReminderRunReport};
pub use outbox::{DeliveryFailure, DeliveryReport, Outbox};

/// Errors produced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Domain rule violated.
    #[error(transparent)]
    Billing(#[from] BillingError),

    /// Storage operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Delivery attempt failed.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl EngineError {
    /// Whether the error means the store itself is unusable.
    ///
    /// Such errors abort a whole run; anything else is scoped to one account.
    #[must_use]
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_backend_failure())
    }

    pub(crate) fn account_not_found(account_id: AccountId) -> Self {
        Self::Billing(BillingError::AccountNotFound { account_id })
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Price used while no settings have been stored.
    pub default_price_cents: i64,

    /// Reminder horizon for accounts without an explicit preference.
    pub default_reminder_days: u8,

    /// Operator addresses that receive failure alerts.
    pub operator_addresses: Vec<String>,

    /// Upper bound for a single delivery attempt.
    pub delivery_timeout: Duration,

    /// Maximum deliveries in flight during post-run dispatch.
    pub delivery_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_price_cents: DEFAULT_SUBSCRIPTION_PRICE_CENTS,
            default_reminder_days: DEFAULT_NOTIFY_BEFORE_DAYS,
            operator_addresses: Vec::new(),
            delivery_timeout: Duration::from_secs(10),
            delivery_concurrency: 8,
        }
    }
}

/// Coordinates billing runs, reminders, notifications and account admin.
pub struct BillingEngine {
    store: Arc<dyn Store>,
    channel: Arc<dyn DeliveryChannel>,
    outbox: Outbox,
    clock: BillingClock,
    locks: AccountLocks,
    config: EngineConfig,
}

impl BillingEngine {
    /// Create an engine over a store and a delivery channel.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        channel: Arc<dyn DeliveryChannel>,
        config: EngineConfig,
    ) -> Self {
        Self {
            outbox: Outbox::new(Arc::clone(&store), config.delivery_timeout),
            clock: BillingClock::new(Arc::clone(&store)),
            locks: AccountLocks::new(),
            store,
            channel,
            config,
        }
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// The notification outbox.
    #[must_use]
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current billing settings, falling back to the configured default price.
    ///
    /// Runs take one snapshot at their start so a price change never splits
    /// a run.
    pub fn settings_snapshot(&self) -> Result<BillingSettings> {
        Ok(self
            .store
            .get_settings()?
            .unwrap_or_else(|| self.default_settings()))
    }

    fn default_settings(&self) -> BillingSettings {
        BillingSettings {
            subscription_price_cents: self.config.default_price_cents,
            payment_details: PaymentDetails::default(),
            updated_at: Utc::now(),
        }
    }
}
