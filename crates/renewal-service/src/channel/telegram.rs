//! Telegram Bot API delivery channel.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{DeliveryChannel, DeliveryError};

/// Default Telegram Bot API base URL.
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Telegram Bot API client; addresses are chat ids.
#[derive(Clone)]
pub struct TelegramChannel {
    client: Client,
    base_url: String,
    bot_token: String,
}

impl fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("base_url", &self.base_url)
            .field("bot_token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramChannel {
    /// Create a new Telegram channel.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Bot API URL (e.g., `"https://api.telegram.org"`)
    /// * `bot_token` - Bot token issued by `BotFather`
    /// * `timeout` - Upper bound for one HTTP request
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        bot_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
        })
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    async fn send(&self, address: &str, text: &str) -> Result<(), DeliveryError> {
        // The token is part of the path; errors must not carry the URL.
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);

        let response = self
            .client
            .post(&url)
            .json(&SendMessageRequest {
                chat_id: address,
                text,
            })
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        let body = response.text().await.map_err(reqwest::Error::without_url)?;
        let parsed: Option<ApiResponse> = serde_json::from_str(&body).ok();

        match parsed {
            Some(api) if status.is_success() && api.ok => {
                tracing::debug!(chat_id = %address, "Telegram message delivered");
                Ok(())
            }
            Some(api) => Err(DeliveryError::Api {
                status: status.as_u16(),
                description: api.description.unwrap_or_else(|| "unknown error".into()),
            }),
            None => Err(DeliveryError::Api {
                status: status.as_u16(),
                description: body,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
