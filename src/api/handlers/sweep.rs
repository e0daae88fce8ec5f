//! Manual sweep trigger.
//!
//! A sweep outlives the request timeout, so this route is mounted outside
//! the timeout layer and the sweep itself runs on its own task.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::error::{ErrorResponse, TrackerError};
use crate::scheduler::SweepReport;

/// `POST /sweep`: Run one polling sweep now and return its tally.
///
/// # Errors
///
/// Returns [`TrackerError::SweepInProgress`] if a sweep is already running,
/// or [`TrackerError::Internal`] if the sweep task panicked.
#[utoipa::path(
    post,
    path = "/api/v1/sweep",
    tag = "Scheduler",
    summary = "Run a polling sweep",
    description = "Re-checks every tracked product and notifies subscribers of price changes. Per-product failures are counted, not returned.",
    responses(
        (status = 200, description = "Sweep completed", body = SweepReport),
        (status = 409, description = "A sweep is already running", body = ErrorResponse),
    )
)]
pub async fn run_sweep(State(state): State<AppState>) -> Result<impl IntoResponse, TrackerError> {
    // A dropped connection must not abandon products mid-sweep.
    let scheduler = Arc::clone(&state.scheduler);
    let report = tokio::spawn(async move { scheduler.run_sweep().await })
        .await
        .map_err(|e| TrackerError::Internal(format!("sweep task: {e}")))??;
    Ok(Json(report))
}

/// Scheduler routes, mounted at `/api/v1` without a request timeout.
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/v1/sweep", post(run_sweep))
}
