//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in column families.

use chrono::{Datelike, NaiveDate};
use renewal_core::{AccountId, NotificationId, TransactionId};

/// Create an account key from an account ID.
#[must_use]
pub fn account_key(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Encode a date so that byte order matches calendar order.
///
/// The day number is stored big-endian with the sign bit flipped.
#[must_use]
pub fn date_prefix(date: NaiveDate) -> [u8; 4] {
    (date.num_days_from_ce() ^ i32::MIN).to_be_bytes()
}

/// Create a due-date index key.
///
/// Format: `date (4 bytes) || account_id (16 bytes)`
#[must_use]
pub fn due_date_key(date: NaiveDate, account_id: &AccountId) -> Vec<u8> {
    let mut key = Vec::with_capacity(20);
    key.extend_from_slice(&date_prefix(date));
    key.extend_from_slice(account_id.as_bytes());
    key
}

/// Extract the account ID from a due-date index key.
///
/// Returns `None` if the key is not 20 bytes.
#[must_use]
pub fn account_id_from_due_date_key(key: &[u8]) -> Option<AccountId> {
    let bytes: [u8; 16] = key.get(4..20)?.try_into().ok()?;
    Some(AccountId::from_bytes(bytes))
}

/// Create an address index key.
#[must_use]
pub fn address_key(address: &str) -> Vec<u8> {
    address.as_bytes().to_vec()
}

/// Create a transaction key from a transaction ID.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create an account-transaction index key.
///
/// Format: `account_id (16 bytes) || transaction_id (16 bytes)`
///
/// Since ULIDs are time-ordered, entries for an account sort by time.
#[must_use]
pub fn account_transaction_key(account_id: &AccountId, transaction_id: &TransactionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(account_id.as_bytes());
    key.extend_from_slice(&transaction_id.to_bytes());
    key
}

/// Create a prefix for iterating all ledger entries of an account.
#[must_use]
pub fn account_transactions_prefix(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Extract the transaction ID from an account-transaction index key.
///
/// Returns `None` if the key is not 32 bytes.
#[must_use]
pub fn transaction_id_from_account_key(key: &[u8]) -> Option<TransactionId> {
    let bytes: [u8; 16] = key.get(16..32)?.try_into().ok()?;
    Some(TransactionId::from_bytes(bytes))
}

/// Create a notification key from a notification ID.
#[must_use]
pub fn notification_key(notification_id: &NotificationId) -> Vec<u8> {
    notification_id.to_bytes().to_vec()
}

/// Decode a notification key.
///
/// Returns `None` if the key is not 16 bytes.
#[must_use]
pub fn notification_id_from_key(key: &[u8]) -> Option<NotificationId> {
    let bytes: [u8; 16] = key.try_into().ok()?;
    Some(NotificationId::from_bytes(bytes))
}
