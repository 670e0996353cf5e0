//! Error types for renewal storage.

use renewal_core::AccountId;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// Record already exists.
    #[error("{entity} already exists: {id}")]
    AlreadyExists {
        /// Kind of record.
        entity: &'static str,
        /// Identifier that collided.
        id: String,
    },

    /// The account changed since it was read (optimistic concurrency check).
    #[error("version conflict on account {account_id}: expected {expected}, found {found}")]
    VersionConflict {
        /// The account that was written concurrently.
        account_id: AccountId,
        /// Version the write was based on.
        expected: u64,
        /// Version currently stored.
        found: u64,
    },

    /// Another account already owns the messaging address.
    #[error("messaging address already in use: {address}")]
    AddressInUse {
        /// The contested address.
        address: String,
    },
}

impl StoreError {
    /// Shorthand for a missing account.
    #[must_use]
    pub fn account_not_found(account_id: &AccountId) -> Self {
        Self::NotFound {
            entity: "account",
            id: account_id.to_string(),
        }
    }

    /// Whether this error means the backing store itself is unusable, as
    /// opposed to a problem with one record.
    #[must_use]
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Serialization(_))
    }
}
