//! Scheduler status.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::auth::AdminAuth;
use crate::scheduler::JobStatus;
use crate::state::AppState;

/// Run history of every periodic job.
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
) -> Json<BTreeMap<&'static str, JobStatus>> {
    Json(state.jobs.snapshot())
}
