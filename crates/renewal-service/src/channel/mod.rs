//! Messaging delivery channels.
//!
//! A channel takes an opaque address and a text and either delivers it or
//! returns a [`DeliveryError`]. Delivery errors are always recoverable: the
//! outbox leaves the notification unsent for the next sweep.

pub mod telegram;

use std::time::Duration;

use async_trait::async_trait;

pub use telegram::TelegramChannel;

/// Error type for delivery attempts.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The messaging API rejected the message.
    #[error("messaging API error: {status} - {description}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description returned by the API.
        description: String,
    },

    /// The attempt did not finish in time.
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    /// No transport is configured.
    #[error("no delivery channel configured")]
    NotConfigured,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// A transport that can deliver a text message to an address.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Deliver `text` to `address`.
    async fn send(&self, address: &str, text: &str) -> Result<(), DeliveryError>;

    /// Short channel name for logs.
    fn name(&self) -> &'static str;
}

/// Channel used when no transport is configured.
///
/// Every attempt fails, so notifications stay in the outbox until a real
/// channel is configured and the service restarts.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredChannel;

#[async_trait]
impl DeliveryChannel for UnconfiguredChannel {
    async fn send(&self, _address: &str, _text: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::NotConfigured)
    }

    fn name(&self) -> &'static str {
        "unconfigured"
    }
}
