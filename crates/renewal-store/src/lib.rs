//! Storage layer for the renewal engine.
//!
//! The account/transaction/notification store is the single shared resource
//! of the engine. This crate defines it as the [`Store`] trait with two
//! backends:
//!
//! - [`MemoryStore`]: process-local, always available (tests, single-node
//!   deployments without persistence).
//! - `RocksStore`: `RocksDB` with column families and secondary indexes,
//!   behind the `rocksdb-backend` feature.
//!
//! # Concurrency
//!
//! Every account mutation goes through [`Store::commit_account`], which writes
//! the account and its optional ledger entry atomically and performs an
//! optimistic version check: the write is rejected with
//! [`StoreError::VersionConflict`] if the stored account changed since it was
//! read.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use renewal_core::Account;
//! use renewal_store::{MemoryStore, Store};
//!
//! let store = MemoryStore::new();
//! let account = Account::new("alice", NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
//! store.insert_account(&account, None).unwrap();
//!
//! let due = store
//!     .list_accounts_due_on(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap())
//!     .unwrap();
//! assert_eq!(due.len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod keys;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

#[cfg(test)]
pub(crate) mod conformance;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use chrono::{DateTime, NaiveDate, Utc};
use renewal_core::{
    Account, AccountId, BillingSettings, Notification, NotificationId, Transaction, TransactionId,
};

/// The storage trait defining all database operations.
///
/// Implementations must be safe to share between the scheduler's jobs and
/// the admin surface.
pub trait Store: Send + Sync {
    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Insert a newly provisioned account, together with its opening ledger
    /// entry when there is one. Both are written atomically.
    ///
    /// # Errors
    ///
    /// - `StoreError::AlreadyExists` if the id is taken.
    /// - `StoreError::AddressInUse` if another account owns the address.
    fn insert_account(&self, account: &Account, transaction: Option<&Transaction>) -> Result<()>;

    /// Get an account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>>;

    /// List every account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_accounts(&self) -> Result<Vec<Account>>;

    /// List accounts whose `next_billing_date` equals `date`, regardless of
    /// status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_accounts_due_on(&self, date: NaiveDate) -> Result<Vec<Account>>;

    /// Find the account linked to a messaging address.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_account_by_address(&self, address: &str) -> Result<Option<Account>>;

    /// Write an account (and optionally one ledger entry) atomically.
    ///
    /// `account.version` must equal the stored version; the stored copy gets
    /// `version + 1` and is returned.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::VersionConflict` if the account changed since it was read.
    /// - `StoreError::AddressInUse` if another account owns the new address.
    fn commit_account(
        &self,
        account: &Account,
        transaction: Option<&Transaction>,
    ) -> Result<Account>;

    // =========================================================================
    // Transaction Operations
    // =========================================================================

    /// Get a ledger entry by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<Transaction>>;

    /// List ledger entries for an account, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>>;

    // =========================================================================
    // Notification Operations
    // =========================================================================

    /// Persist a new notification.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the id is taken.
    fn insert_notification(&self, notification: &Notification) -> Result<()>;

    /// Get a notification by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_notification(&self, notification_id: &NotificationId) -> Result<Option<Notification>>;

    /// List unsent notifications, oldest first, optionally for one account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_pending_notifications(&self, account_id: Option<&AccountId>)
        -> Result<Vec<Notification>>;

    /// Flip a notification to sent.
    ///
    /// Returns `false` without writing if it was already sent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the notification doesn't exist.
    fn mark_notification_sent(
        &self,
        notification_id: &NotificationId,
        sent_at: DateTime<Utc>,
    ) -> Result<bool>;

    // =========================================================================
    // Settings Operations
    // =========================================================================

    /// Get the stored billing settings, if any were ever saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_settings(&self) -> Result<Option<BillingSettings>>;

    /// Replace the billing settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_settings(&self, settings: &BillingSettings) -> Result<()>;
}
