//! Manual job triggers.
//!
//! Each trigger runs the same code path as the scheduler and is recorded on
//! the job board.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::auth::AdminAuth;
use crate::engine::{BillingRunReport, DeliveryReport, ReminderRunReport};
use crate::error::ApiError;
use crate::scheduler::JobKind;
use crate::state::AppState;

/// Optional run date; defaults to today in the schedule's time zone.
#[derive(Debug, Deserialize)]
pub struct RunQuery {
    /// Date to run for (`YYYY-MM-DD`).
    pub date: Option<NaiveDate>,
}

fn run_date(state: &AppState, query: &RunQuery) -> NaiveDate {
    query
        .date
        .unwrap_or_else(|| state.config.schedule_config().today())
}

/// `POST /v1/runs/billing`
pub async fn run_billing(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Query(query): Query<RunQuery>,
) -> Result<Json<BillingRunReport>, ApiError> {
    let date = run_date(&state, &query);
    tracing::info!(admin_id = %admin.admin_id, %date, "Manual billing run");

    let report = state
        .jobs
        .track(JobKind::DailyBilling, state.engine.run_daily_billing(date))
        .await?;

    Ok(Json(report))
}

/// `POST /v1/runs/reminders`
pub async fn run_reminders(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Query(query): Query<RunQuery>,
) -> Result<Json<ReminderRunReport>, ApiError> {
    let date = run_date(&state, &query);
    tracing::info!(admin_id = %admin.admin_id, %date, "Manual reminder check");

    let report = state
        .jobs
        .track(JobKind::ReminderCheck, state.engine.run_reminder_check(date))
        .await?;

    Ok(Json(report))
}

/// `POST /v1/runs/outbox`
pub async fn run_outbox(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
) -> Result<Json<DeliveryReport>, ApiError> {
    tracing::info!(admin_id = %admin.admin_id, "Manual outbox sweep");

    let report = state
        .jobs
        .track(JobKind::OutboxSweep, state.engine.run_outbox_sweep(None))
        .await?;

    Ok(Json(report))
}
