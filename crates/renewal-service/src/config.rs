//! Service configuration.

use std::path::Path;
use std::time::Duration;

use chrono::{FixedOffset, NaiveTime, Offset, Utc};
use renewal_core::{DEFAULT_NOTIFY_BEFORE_DAYS, DEFAULT_SUBSCRIPTION_PRICE_CENTS, MAX_NOTIFY_BEFORE_DAYS};
use serde::Deserialize;

use crate::channel::telegram::DEFAULT_TELEGRAM_API_URL;
use crate::engine::EngineConfig;
use crate::scheduler::ScheduleConfig;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/renewal").
    pub data_dir: String,

    /// Admin API key; `/v1` rejects every request while unset.
    pub admin_api_key: Option<String>,

    /// Telegram bot token (optional; without it nothing is delivered).
    pub telegram_bot_token: Option<String>,

    /// Telegram Bot API base URL.
    pub telegram_api_url: String,

    /// Operator addresses that receive debtor and job failure alerts.
    pub operator_addresses: Vec<String>,

    /// Price used until one is stored through the settings endpoint.
    pub default_subscription_price_cents: i64,

    /// Reminder horizon for accounts without their own preference.
    pub default_reminder_days: u8,

    /// Local hour of the daily billing and reminder runs.
    pub billing_run_hour: u32,

    /// Local minute of the daily runs.
    pub billing_run_minute: u32,

    /// Offset from UTC, in minutes, that defines the local day.
    pub schedule_utc_offset_minutes: i32,

    /// Seconds between outbox sweeps.
    pub outbox_sweep_interval_seconds: u64,

    /// Upper bound for one delivery attempt.
    pub delivery_timeout_seconds: u64,

    /// Concurrent deliveries after a run.
    pub delivery_concurrency: usize,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Telegram secrets file structure.
#[derive(Debug, Deserialize)]
struct TelegramSecrets {
    bot_token: String,
    #[serde(default)]
    api_url: Option<String>,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn env_list(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|value| {
        value
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        // Try to load Telegram secrets from file first, then fall back to env vars
        let (telegram_bot_token, telegram_api_url) = load_telegram_secrets();

        let default_reminder_days = match env_parse::<u8>("DEFAULT_REMINDER_DAYS") {
            Some(days) if days <= MAX_NOTIFY_BEFORE_DAYS => days,
            Some(days) => {
                tracing::warn!(days, max = MAX_NOTIFY_BEFORE_DAYS, "DEFAULT_REMINDER_DAYS out of range, using maximum");
                MAX_NOTIFY_BEFORE_DAYS
            }
            None => defaults.default_reminder_days,
        };

        let default_subscription_price_cents =
            match env_parse::<i64>("DEFAULT_SUBSCRIPTION_PRICE_CENTS") {
                Some(price) if price >= 0 => price,
                Some(price) => {
                    tracing::warn!(price, "Negative DEFAULT_SUBSCRIPTION_PRICE_CENTS ignored");
                    defaults.default_subscription_price_cents
                }
                None => defaults.default_subscription_price_cents,
            };

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok().filter(|k| !k.is_empty()),
            telegram_bot_token,
            telegram_api_url: telegram_api_url.unwrap_or(defaults.telegram_api_url),
            operator_addresses: env_list("OPERATOR_ADDRESSES").unwrap_or_default(),
            default_subscription_price_cents,
            default_reminder_days,
            billing_run_hour: env_parse("BILLING_RUN_HOUR").unwrap_or(defaults.billing_run_hour),
            billing_run_minute: env_parse("BILLING_RUN_MINUTE")
                .unwrap_or(defaults.billing_run_minute),
            schedule_utc_offset_minutes: env_parse("SCHEDULE_UTC_OFFSET_MINUTES")
                .unwrap_or(defaults.schedule_utc_offset_minutes),
            outbox_sweep_interval_seconds: env_parse("OUTBOX_SWEEP_INTERVAL_SECONDS")
                .filter(|s| *s > 0)
                .unwrap_or(defaults.outbox_sweep_interval_seconds),
            delivery_timeout_seconds: env_parse("DELIVERY_TIMEOUT_SECONDS")
                .filter(|s| *s > 0)
                .unwrap_or(defaults.delivery_timeout_seconds),
            delivery_concurrency: env_parse("DELIVERY_CONCURRENCY")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.delivery_concurrency),
            cors_origins: env_list("CORS_ORIGINS").unwrap_or(defaults.cors_origins),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
        }
    }

    /// Engine settings derived from this configuration.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            default_price_cents: self.default_subscription_price_cents,
            default_reminder_days: self.default_reminder_days,
            operator_addresses: self.operator_addresses.clone(),
            delivery_timeout: Duration::from_secs(self.delivery_timeout_seconds),
            delivery_concurrency: self.delivery_concurrency,
        }
    }

    /// Scheduler settings derived from this configuration.
    ///
    /// An invalid run time or offset falls back to 10:00 UTC.
    #[must_use]
    pub fn schedule_config(&self) -> ScheduleConfig {
        let daily_at = NaiveTime::from_hms_opt(self.billing_run_hour, self.billing_run_minute, 0)
            .unwrap_or_else(|| {
                tracing::warn!(
                    hour = self.billing_run_hour,
                    minute = self.billing_run_minute,
                    "Invalid billing run time, using 10:00"
                );
                NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default()
            });

        let utc_offset = FixedOffset::east_opt(self.schedule_utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| {
                tracing::warn!(
                    minutes = self.schedule_utc_offset_minutes,
                    "Invalid UTC offset, using UTC"
                );
                Utc.fix()
            });

        ScheduleConfig {
            daily_at,
            utc_offset,
            sweep_interval: Duration::from_secs(self.outbox_sweep_interval_seconds),
        }
    }
}

/// Load Telegram secrets from file or environment.
fn load_telegram_secrets() -> (Option<String>, Option<String>) {
    // Try multiple paths for the secrets file
    let secret_paths = [".secrets/telegram.json", "../.secrets/telegram.json"];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<TelegramSecrets>(path) {
            tracing::info!(path = %path, "Loaded Telegram secrets from file");
            return (Some(secrets.bot_token), secrets.api_url);
        }
    }

    // Fall back to environment variables
    tracing::debug!("Telegram secrets file not found, using environment variables");
    (
        std::env::var("TELEGRAM_BOT_TOKEN").ok().filter(|t| !t.is_empty()),
        std::env::var("TELEGRAM_API_URL").ok(),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/renewal".into(),
            admin_api_key: None,
            telegram_bot_token: None,
            telegram_api_url: DEFAULT_TELEGRAM_API_URL.into(),
            operator_addresses: Vec::new(),
            default_subscription_price_cents: DEFAULT_SUBSCRIPTION_PRICE_CENTS,
            default_reminder_days: DEFAULT_NOTIFY_BEFORE_DAYS,
            billing_run_hour: 10,
            billing_run_minute: 0,
            schedule_utc_offset_minutes: 0,
            outbox_sweep_interval_seconds: 300,
            delivery_timeout_seconds: 10,
            delivery_concurrency: 8,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024, // 1MB
            request_timeout_seconds: 30,
        }
    }
}
