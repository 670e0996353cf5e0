//! Billing settings handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use renewal_core::BillingSettings;

use crate::auth::AdminAuth;
use crate::engine::SettingsUpdate;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /v1/settings`
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
) -> Result<Json<BillingSettings>, ApiError> {
    Ok(Json(state.engine.settings_snapshot()?))
}

/// `PUT /v1/settings` - takes effect from the next run.
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<SettingsUpdate>,
) -> Result<Json<BillingSettings>, ApiError> {
    let settings = state.engine.update_settings(body)?;
    tracing::info!(
        admin_id = %admin.admin_id,
        price_cents = settings.subscription_price_cents,
        "Settings updated via API"
    );
    Ok(Json(settings))
}
