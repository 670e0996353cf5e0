//! Debtor listing.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use super::accounts::AccountResponse;
use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Debtor listing filter.
#[derive(Debug, Default, Deserialize)]
pub struct DebtorsQuery {
    /// Include accounts without a messaging address.
    #[serde(default)]
    pub include_ghosts: bool,
}

/// `GET /v1/debtors` - accounts below the current price, lowest balance first.
pub async fn list_debtors(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Query(query): Query<DebtorsQuery>,
) -> Result<Json<Vec<AccountResponse>>, ApiError> {
    let debtors = state.engine.debtors(query.include_ghosts)?;
    Ok(Json(debtors.iter().map(AccountResponse::from).collect()))
}
