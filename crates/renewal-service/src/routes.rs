//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{accounts, debtors, health, jobs, runs, settings};
use crate::state::AppState;

/// Maximum concurrent requests for admin API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Admin (`X-Admin-Key`)
/// - `GET /v1/jobs` - Scheduler run history
/// - `POST /v1/runs/billing` - Run daily billing now (`?date=YYYY-MM-DD`)
/// - `POST /v1/runs/reminders` - Run the reminder check now
/// - `POST /v1/runs/outbox` - Sweep the outbox now
/// - `POST /v1/accounts` - Create account
/// - `GET /v1/accounts/{id}` - Get account
/// - `GET /v1/accounts/{id}/transactions` - Ledger history, newest first
/// - `POST /v1/accounts/{id}/balance` - Deposit or adjust balance
/// - `PUT /v1/accounts/{id}/preferences` - Replace notification preferences
/// - `PUT /v1/accounts/{id}/status` - Override status
/// - `POST /v1/accounts/{id}/link` - Link a messaging address
/// - `POST /v1/accounts/{id}/notifications` - Send a message to the account
/// - `GET /v1/debtors` - Accounts below the current price
/// - `GET|PUT /v1/settings` - Price and payment details
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let api_routes = Router::new()
        // Scheduler
        .route("/jobs", get(jobs::list_jobs))
        .route("/runs/billing", post(runs::run_billing))
        .route("/runs/reminders", post(runs::run_reminders))
        .route("/runs/outbox", post(runs::run_outbox))
        // Accounts
        .route("/accounts", post(accounts::create_account))
        .route("/accounts/:id", get(accounts::get_account))
        .route("/accounts/:id/transactions", get(accounts::list_transactions))
        .route("/accounts/:id/balance", post(accounts::adjust_balance))
        .route("/accounts/:id/preferences", put(accounts::update_preferences))
        .route("/accounts/:id/status", put(accounts::set_status))
        .route("/accounts/:id/link", post(accounts::link_address))
        .route("/accounts/:id/notifications", post(accounts::send_notification))
        // Reports and settings
        .route("/debtors", get(debtors::list_debtors))
        .route(
            "/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
