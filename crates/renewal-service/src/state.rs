//! Application state.

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::engine::BillingEngine;
use crate::scheduler::JobBoard;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The billing engine.
    pub engine: Arc<BillingEngine>,

    /// Scheduler run history.
    pub jobs: Arc<JobBoard>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(engine: Arc<BillingEngine>, jobs: Arc<JobBoard>, config: ServiceConfig) -> Self {
        if config.admin_api_key.is_none() {
            tracing::warn!("ADMIN_API_KEY not set - admin API will reject all requests");
        }

        Self {
            engine,
            jobs,
            config,
        }
    }
}
