//! API handlers.

pub mod accounts;
pub mod debtors;
pub mod health;
pub mod jobs;
pub mod runs;
pub mod settings;

use renewal_core::AccountId;

use crate::error::ApiError;

/// Parse an account id from a path segment.
pub(crate) fn parse_account_id(raw: &str) -> Result<AccountId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid account id: {raw}")))
}
