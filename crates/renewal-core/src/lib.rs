//! Core types and billing logic for the renewal engine.
//!
//! This crate holds everything about recurring billing that does not touch
//! storage or the network:
//!
//! - **Identifiers**: `AccountId`, `TransactionId`, `NotificationId`
//! - **Accounts**: `Account`, `AccountStatus`, `NotificationPreferences`
//! - **Ledger**: `charge`, `adjust`, `Transaction`, `TransactionKind`
//! - **Status machine**: `transition`, `StatusChange`
//! - **Outbox entries**: `Notification`, `NotificationKind`, `Recipient`
//! - **Settings**: `BillingSettings`, `PaymentDetails`
//!
//! # Amounts
//!
//! All amounts are `i64` minor units (cents): 100.00 is stored as `10000`.
//! Balances may be negative.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod calendar;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod money;
pub mod notification;
pub mod settings;
pub mod status;
pub mod transaction;

pub use account::{
    Account, AccountStatus, NotificationPreferences, DEFAULT_NOTIFY_BEFORE_DAYS,
    MAX_NOTIFY_BEFORE_DAYS,
};
pub use error::{BillingError, Result};
pub use ids::{AccountId, IdError, NotificationId, TransactionId};
pub use ledger::{ChargeOutcome, ChargeResult, SUBSCRIPTION_CHARGE_MEMO};
pub use money::format_cents;
pub use notification::{Notification, NotificationKind, Recipient};
pub use settings::{BillingSettings, PaymentDetails, DEFAULT_SUBSCRIPTION_PRICE_CENTS};
pub use status::StatusChange;
pub use transaction::{Transaction, TransactionKind};
