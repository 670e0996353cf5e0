//! In-memory storage implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, NaiveDate, Utc};
use renewal_core::{
    Account, AccountId, BillingSettings, Notification, NotificationId, Transaction, TransactionId,
};

use crate::error::{Result, StoreError};
use crate::Store;

#[derive(Default)]
struct Inner {
    accounts: HashMap<AccountId, Account>,
    transactions: BTreeMap<TransactionId, Transaction>,
    notifications: BTreeMap<NotificationId, Notification>,
    settings: Option<BillingSettings>,
}

impl Inner {
    fn address_owner(&self, address: &str) -> Option<AccountId> {
        self.accounts
            .values()
            .find(|a| a.messaging_address.as_deref() == Some(address))
            .map(|a| a.id)
    }

    fn check_address(&self, account: &Account) -> Result<()> {
        if let Some(address) = &account.messaging_address {
            if let Some(owner) = self.address_owner(address) {
                if owner != account.id {
                    return Err(StoreError::AddressInUse {
                        address: address.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Process-local storage guarded by a single reader-writer lock.
///
/// Every write takes the lock exclusively, so each call is atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }
}

impl Store for MemoryStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    fn insert_account(&self, account: &Account, transaction: Option<&Transaction>) -> Result<()> {
        let mut inner = self.write()?;
        if inner.accounts.contains_key(&account.id) {
            return Err(StoreError::AlreadyExists {
                entity: "account",
                id: account.id.to_string(),
            });
        }
        inner.check_address(account)?;
        if let Some(tx) = transaction {
            inner.transactions.insert(tx.id, tx.clone());
        }
        inner.accounts.insert(account.id, account.clone());
        Ok(())
    }

    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        Ok(self.read()?.accounts.get(account_id).cloned())
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self.read()?.accounts.values().cloned().collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    fn list_accounts_due_on(&self, date: NaiveDate) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self
            .read()?
            .accounts
            .values()
            .filter(|a| a.next_billing_date == date)
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    fn find_account_by_address(&self, address: &str) -> Result<Option<Account>> {
        let inner = self.read()?;
        Ok(inner
            .address_owner(address)
            .and_then(|id| inner.accounts.get(&id).cloned()))
    }

    fn commit_account(
        &self,
        account: &Account,
        transaction: Option<&Transaction>,
    ) -> Result<Account> {
        let mut inner = self.write()?;

        let found = inner
            .accounts
            .get(&account.id)
            .map(|stored| stored.version)
            .ok_or_else(|| StoreError::account_not_found(&account.id))?;

        if found != account.version {
            return Err(StoreError::VersionConflict {
                account_id: account.id,
                expected: account.version,
                found,
            });
        }
        inner.check_address(account)?;

        let mut stored = account.clone();
        stored.version += 1;

        if let Some(tx) = transaction {
            inner.transactions.insert(tx.id, tx.clone());
        }
        inner.accounts.insert(stored.id, stored.clone());

        tracing::debug!(
            account_id = %stored.id,
            version = stored.version,
            with_transaction = transaction.is_some(),
            "Account committed"
        );

        Ok(stored)
    }

    // =========================================================================
    // Transaction Operations
    // =========================================================================

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<Transaction>> {
        Ok(self.read()?.transactions.get(transaction_id).cloned())
    }

    fn list_transactions_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        Ok(self
            .read()?
            .transactions
            .values()
            .rev()
            .filter(|tx| tx.account_id == *account_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    // =========================================================================
    // Notification Operations
    // =========================================================================

    fn insert_notification(&self, notification: &Notification) -> Result<()> {
        let mut inner = self.write()?;
        if inner.notifications.contains_key(&notification.id) {
            return Err(StoreError::AlreadyExists {
                entity: "notification",
                id: notification.id.to_string(),
            });
        }
        inner
            .notifications
            .insert(notification.id, notification.clone());
        Ok(())
    }

    fn get_notification(&self, notification_id: &NotificationId) -> Result<Option<Notification>> {
        Ok(self.read()?.notifications.get(notification_id).cloned())
    }

    fn list_pending_notifications(
        &self,
        account_id: Option<&AccountId>,
    ) -> Result<Vec<Notification>> {
        Ok(self
            .read()?
            .notifications
            .values()
            .filter(|n| !n.sent)
            .filter(|n| account_id.map_or(true, |id| n.account_id() == Some(*id)))
            .cloned()
            .collect())
    }

    fn mark_notification_sent(
        &self,
        notification_id: &NotificationId,
        sent_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut inner = self.write()?;
        let notification =
            inner
                .notifications
                .get_mut(notification_id)
                .ok_or_else(|| StoreError::NotFound {
                    entity: "notification",
                    id: notification_id.to_string(),
                })?;
        Ok(notification.mark_sent(sent_at))
    }

    // =========================================================================
    // Settings Operations
    // =========================================================================

    fn get_settings(&self) -> Result<Option<BillingSettings>> {
        Ok(self.read()?.settings.clone())
    }

    fn put_settings(&self, settings: &BillingSettings) -> Result<()> {
        self.write()?.settings = Some(settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance;

    #[test]
    fn account_lifecycle() {
        conformance::account_lifecycle(&MemoryStore::new());
    }

    #[test]
    fn due_date_index_follows_commits() {
        conformance::due_date_index_follows_commits(&MemoryStore::new());
    }

    #[test]
    fn optimistic_version_check() {
        conformance::optimistic_version_check(&MemoryStore::new());
    }

    #[test]
    fn address_uniqueness() {
        conformance::address_uniqueness(&MemoryStore::new());
    }

    #[test]
    fn transaction_history_newest_first() {
        conformance::transaction_history_newest_first(&MemoryStore::new());
    }

    #[test]
    fn insert_with_opening_entry() {
        conformance::insert_with_opening_entry(&MemoryStore::new());
    }

    #[test]
    fn pending_notifications_and_marking() {
        conformance::pending_notifications_and_marking(&MemoryStore::new());
    }

    #[test]
    fn settings_roundtrip() {
        conformance::settings_roundtrip(&MemoryStore::new());
    }
}
