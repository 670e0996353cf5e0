//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.
//! Values are CBOR; secondary indexes live in their own column families and
//! are maintained in the same `WriteBatch` as the record they index.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use renewal_core::{
    Account, AccountId, BillingSettings, Notification, NotificationId, Transaction, TransactionId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf, BILLING_SETTINGS_KEY};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes read-modify-write sequences (version checks, index moves).
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Database("write lock poisoned".into()))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_value<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Collect keys of a column family that start with `prefix`.
    fn keys_with_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        let mut keys = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_vec());
        }
        Ok(keys)
    }

    fn address_owner(&self, address: &str) -> Result<Option<AccountId>> {
        let cf = self.cf(cf::ACCOUNTS_BY_ADDRESS)?;
        let Some(raw) = self
            .db
            .get_cf(&cf, keys::address_key(address))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };
        let bytes: [u8; 16] = raw
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Serialization("malformed address index entry".into()))?;
        Ok(Some(AccountId::from_bytes(bytes)))
    }

    fn check_address(&self, account: &Account) -> Result<()> {
        if let Some(address) = &account.messaging_address {
            if let Some(owner) = self.address_owner(address)? {
                if owner != account.id {
                    return Err(StoreError::AddressInUse {
                        address: address.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Add the account record and its index entries to `batch`, removing
    /// index entries of `previous` that no longer apply.
    fn stage_account(
        &self,
        batch: &mut WriteBatch,
        account: &Account,
        previous: Option<&Account>,
    ) -> Result<()> {
        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_due = self.cf(cf::ACCOUNTS_BY_DUE_DATE)?;
        let cf_address = self.cf(cf::ACCOUNTS_BY_ADDRESS)?;

        if let Some(previous) = previous {
            if previous.next_billing_date != account.next_billing_date {
                batch.delete_cf(
                    &cf_due,
                    keys::due_date_key(previous.next_billing_date, &previous.id),
                );
            }
            if let Some(old) = &previous.messaging_address {
                if account.messaging_address.as_ref() != Some(old) {
                    batch.delete_cf(&cf_address, keys::address_key(old));
                }
            }
        }

        batch.put_cf(
            &cf_accounts,
            keys::account_key(&account.id),
            Self::serialize(account)?,
        );
        batch.put_cf(
            &cf_due,
            keys::due_date_key(account.next_billing_date, &account.id),
            [],
        );
        if let Some(address) = &account.messaging_address {
            batch.put_cf(&cf_address, keys::address_key(address), account.id.as_bytes());
        }
        Ok(())
    }

    /// Add a ledger entry and its per-account index entry to `batch`.
    fn stage_transaction(&self, batch: &mut WriteBatch, tx: &Transaction) -> Result<()> {
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_by_account = self.cf(cf::TRANSACTIONS_BY_ACCOUNT)?;
        batch.put_cf(&cf_tx, keys::transaction_key(&tx.id), Self::serialize(tx)?);
        batch.put_cf(
            &cf_by_account,
            keys::account_transaction_key(&tx.account_id, &tx.id),
            [],
        );
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    fn insert_account(&self, account: &Account, transaction: Option<&Transaction>) -> Result<()> {
        let _guard = self.lock()?;

        if self.get_account(&account.id)?.is_some() {
            return Err(StoreError::AlreadyExists {
                entity: "account",
                id: account.id.to_string(),
            });
        }
        self.check_address(account)?;

        let mut batch = WriteBatch::default();
        self.stage_account(&mut batch, account, None)?;
        if let Some(tx) = transaction {
            self.stage_transaction(&mut batch, tx)?;
        }
        self.write(batch)
    }

    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        self.get_value(cf::ACCOUNTS, &keys::account_key(account_id))
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        let cf = self.cf(cf::ACCOUNTS)?;
        let mut accounts = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            accounts.push(Self::deserialize(&value)?);
        }
        Ok(accounts)
    }

    fn list_accounts_due_on(&self, date: NaiveDate) -> Result<Vec<Account>> {
        let prefix = keys::date_prefix(date);
        let mut accounts = Vec::new();

        for key in self.keys_with_prefix(cf::ACCOUNTS_BY_DUE_DATE, &prefix)? {
            let Some(account_id) = keys::account_id_from_due_date_key(&key) else {
                tracing::warn!("Skipping malformed due-date index key");
                continue;
            };
            // Index entries are written with the record, so a miss means the
            // record moved between the scan and the lookup.
            if let Some(account) = self.get_account(&account_id)? {
                if account.next_billing_date == date {
                    accounts.push(account);
                }
            }
        }

        Ok(accounts)
    }

    fn find_account_by_address(&self, address: &str) -> Result<Option<Account>> {
        match self.address_owner(address)? {
            Some(account_id) => self.get_account(&account_id),
            None => Ok(None),
        }
    }

    fn commit_account(
        &self,
        account: &Account,
        transaction: Option<&Transaction>,
    ) -> Result<Account> {
        let _guard = self.lock()?;

        let previous = self
            .get_account(&account.id)?
            .ok_or_else(|| StoreError::account_not_found(&account.id))?;

        if previous.version != account.version {
            return Err(StoreError::VersionConflict {
                account_id: account.id,
                expected: account.version,
                found: previous.version,
            });
        }
        self.check_address(account)?;

        let mut stored = account.clone();
        stored.version += 1;

        let mut batch = WriteBatch::default();
        self.stage_account(&mut batch, &stored, Some(&previous))?;

        if let Some(tx) = transaction {
            self.stage_transaction(&mut batch, tx)?;
        }

        self.write(batch)?;

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
        self.get_value(cf::TRANSACTIONS, &keys::transaction_key(transaction_id))
    }

    fn list_transactions_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        let prefix = keys::account_transactions_prefix(account_id);

        // ULIDs are time-ordered, so reversing the prefix scan gives newest first.
        let mut index_keys = self.keys_with_prefix(cf::TRANSACTIONS_BY_ACCOUNT, &prefix)?;
        index_keys.reverse();

        let mut transactions = Vec::new();
        for key in index_keys.into_iter().skip(offset).take(limit) {
            let Some(tx_id) = keys::transaction_id_from_account_key(&key) else {
                tracing::warn!(account_id = %account_id, "Skipping malformed transaction index key");
                continue;
            };
            if let Some(tx) = self.get_transaction(&tx_id)? {
                transactions.push(tx);
            }
        }

        Ok(transactions)
    }

    // =========================================================================
    // Notification Operations
    // =========================================================================

    fn insert_notification(&self, notification: &Notification) -> Result<()> {
        let _guard = self.lock()?;

        if self.get_notification(&notification.id)?.is_some() {
            return Err(StoreError::AlreadyExists {
                entity: "notification",
                id: notification.id.to_string(),
            });
        }

        let cf_notifications = self.cf(cf::NOTIFICATIONS)?;
        let cf_pending = self.cf(cf::PENDING_NOTIFICATIONS)?;
        let key = keys::notification_key(&notification.id);

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_notifications, &key, Self::serialize(notification)?);
        if !notification.sent {
            batch.put_cf(&cf_pending, &key, []);
        }
        self.write(batch)
    }

    fn get_notification(&self, notification_id: &NotificationId) -> Result<Option<Notification>> {
        self.get_value(cf::NOTIFICATIONS, &keys::notification_key(notification_id))
    }

    fn list_pending_notifications(
        &self,
        account_id: Option<&AccountId>,
    ) -> Result<Vec<Notification>> {
        let mut pending = Vec::new();

        for key in self.keys_with_prefix(cf::PENDING_NOTIFICATIONS, &[])? {
            let Some(id) = keys::notification_id_from_key(&key) else {
                tracing::warn!("Skipping malformed pending notification key");
                continue;
            };
            let Some(notification) = self.get_notification(&id)? else {
                continue;
            };
            if notification.sent {
                continue;
            }
            if account_id.map_or(true, |wanted| notification.account_id() == Some(*wanted)) {
                pending.push(notification);
            }
        }

        Ok(pending)
    }

    fn mark_notification_sent(
        &self,
        notification_id: &NotificationId,
        sent_at: DateTime<Utc>,
    ) -> Result<bool> {
        let _guard = self.lock()?;

        let mut notification =
            self.get_notification(notification_id)?
                .ok_or_else(|| StoreError::NotFound {
                    entity: "notification",
                    id: notification_id.to_string(),
                })?;

        if !notification.mark_sent(sent_at) {
            return Ok(false);
        }

        let cf_notifications = self.cf(cf::NOTIFICATIONS)?;
        let cf_pending = self.cf(cf::PENDING_NOTIFICATIONS)?;
        let key = keys::notification_key(notification_id);

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_notifications, &key, Self::serialize(&notification)?);
        batch.delete_cf(&cf_pending, &key);
        self.write(batch)?;

        Ok(true)
    }

    // =========================================================================
    // Settings Operations
    // =========================================================================

    fn get_settings(&self) -> Result<Option<BillingSettings>> {
        self.get_value(cf::SETTINGS, BILLING_SETTINGS_KEY)
    }

    fn put_settings(&self, settings: &BillingSettings) -> Result<()> {
        let cf = self.cf(cf::SETTINGS)?;
        self.db
            .put_cf(&cf, BILLING_SETTINGS_KEY, Self::serialize(settings)?)
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}
