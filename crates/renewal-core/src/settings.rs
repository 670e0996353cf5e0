//! Billing settings.
//!
//! The subscription price and payment details are process-wide values edited
//! by administrators. Runs take one [`BillingSettings`] snapshot at start so
//! that a price change mid-run cannot produce mixed charges within a batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};

/// Default subscription price in cents (100.00).
pub const DEFAULT_SUBSCRIPTION_PRICE_CENTS: i64 = 10_000;

/// Snapshot of the billing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingSettings {
    /// Current monthly subscription price in cents. Not versioned.
    pub subscription_price_cents: i64,

    /// Where subscribers send money (shown in failure and reminder messages).
    pub payment_details: PaymentDetails,

    /// When the settings were last changed.
    pub updated_at: DateTime<Utc>,
}

impl BillingSettings {
    /// Create settings with the given price and no payment details.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::InvalidPrice` for a negative price.
    pub fn new(subscription_price_cents: i64) -> Result<Self> {
        validate_price(subscription_price_cents)?;
        Ok(Self {
            subscription_price_cents,
            payment_details: PaymentDetails::default(),
            updated_at: Utc::now(),
        })
    }

    /// Change the subscription price.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::InvalidPrice` for a negative price; the
    /// settings are left untouched.
    pub fn set_price(&mut self, price_cents: i64) -> Result<()> {
        validate_price(price_cents)?;
        self.subscription_price_cents = price_cents;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Reject negative prices.
///
/// # Errors
///
/// Returns `BillingError::InvalidPrice` when `price_cents < 0`.
pub fn validate_price(price_cents: i64) -> Result<()> {
    if price_cents < 0 {
        return Err(BillingError::InvalidPrice { price_cents });
    }
    Ok(())
}

/// Out-of-band payment instructions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    /// Phone number for instant bank transfers.
    pub phone: Option<String>,

    /// Bank account number.
    pub account: Option<String>,

    /// Path of an uploaded payment QR code image.
    pub qr_code_path: Option<String>,
}

impl PaymentDetails {
    /// One-line payment instruction, or `None` when nothing is configured.
    #[must_use]
    pub fn instructions(&self) -> Option<String> {
        let parts: Vec<String> = [
            self.phone.as_ref().map(|p| format!("phone {p}")),
            self.account.as_ref().map(|a| format!("account {a}")),
        ]
        .into_iter()
        .flatten()
        .collect();

        if parts.is_empty() {
            None
        } else {
            Some(format!("Top up via {}.", parts.join(" or ")))
        }
    }

    /// Overwrite only the fields that are present in `update`.
    pub fn merge(&mut self, update: PaymentDetails) {
        if update.phone.is_some() {
            self.phone = update.phone;
        }
        if update.account.is_some() {
            self.account = update.account;
        }
        if update.qr_code_path.is_some() {
            self.qr_code_path = update.qr_code_path;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_price_is_rejected() {
        assert_eq!(
            BillingSettings::new(-1),
            Err(BillingError::InvalidPrice { price_cents: -1 })
        );

        let mut settings = BillingSettings::new(10_000).unwrap();
        assert!(settings.set_price(-5).is_err());
        assert_eq!(settings.subscription_price_cents, 10_000);

        settings.set_price(0).unwrap();
        assert_eq!(settings.subscription_price_cents, 0);
    }

    #[test]
    fn payment_instructions() {
        let mut details = PaymentDetails::default();
        assert_eq!(details.instructions(), None);

        details.phone = Some("+100200".into());
        assert_eq!(details.instructions().unwrap(), "Top up via phone +100200.");

        details.account = Some("4081".into());
        assert_eq!(
            details.instructions().unwrap(),
            "Top up via phone +100200 or account 4081."
        );
    }

    #[test]
    fn merge_keeps_missing_fields() {
        let mut details = PaymentDetails {
            phone: Some("1".into()),
            account: Some("2".into()),
            qr_code_path: None,
        };
        details.merge(PaymentDetails {
            phone: None,
            account: Some("3".into()),
            qr_code_path: Some("qr.png".into()),
        });
        assert_eq!(details.phone.as_deref(), Some("1"));
        assert_eq!(details.account.as_deref(), Some("3"));
        assert_eq!(details.qr_code_path.as_deref(), Some("qr.png"));
    }
}
