//! Renewal Service - recurring billing and notification engine
//!
//! This is the main entry point for the renewal service.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use renewal_service::{
    create_router, AppState, BillingEngine, DeliveryChannel, JobBoard, Scheduler, ServiceConfig,
    TelegramChannel, UnconfiguredChannel,
};
use renewal_store::Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,renewal=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Renewal Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        telegram_configured = %config.telegram_bot_token.is_some(),
        operators = config.operator_addresses.len(),
        "Service configuration loaded"
    );

    let store = open_store(&config)?;
    let channel = build_channel(&config);

    let engine = Arc::new(BillingEngine::new(store, channel, config.engine_config()));
    let jobs = Arc::new(JobBoard::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Scheduler::new(
        Arc::clone(&engine),
        Arc::clone(&jobs),
        config.schedule_config(),
    );
    let tasks = scheduler.spawn(shutdown_rx);

    // Build app state and router
    let state = AppState::new(engine, jobs, config.clone());
    let app = create_router(state);

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown requested");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    // Give in-flight jobs a moment to reach a safe boundary
    for task in tasks {
        if tokio::time::timeout(Duration::from_secs(30), task).await.is_err() {
            tracing::warn!("Scheduler task did not stop in time");
        }
    }

    tracing::info!("Renewal Service stopped");
    Ok(())
}

#[cfg(feature = "rocksdb-backend")]
fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    Ok(Arc::new(renewal_store::RocksStore::open(&config.data_dir)?))
}

#[cfg(not(feature = "rocksdb-backend"))]
fn open_store(_config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::warn!("Built without rocksdb-backend - using in-memory store, state will not persist");
    Ok(Arc::new(renewal_store::MemoryStore::new()))
}

fn build_channel(config: &ServiceConfig) -> Arc<dyn DeliveryChannel> {
    let Some(token) = &config.telegram_bot_token else {
        tracing::warn!("Telegram not configured - notifications will stay in the outbox");
        return Arc::new(UnconfiguredChannel);
    };

    match TelegramChannel::new(
        &config.telegram_api_url,
        token,
        Duration::from_secs(config.delivery_timeout_seconds),
    ) {
        Ok(channel) => {
            tracing::info!(api_url = %config.telegram_api_url, "Telegram delivery enabled");
            Arc::new(channel)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to create Telegram client");
            Arc::new(UnconfiguredChannel)
        }
    }
}
