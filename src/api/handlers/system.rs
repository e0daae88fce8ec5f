//! System endpoints: health check and retailer catalog.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::fetch::RenderMode;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Supported retailer info.
#[derive(Debug, Serialize, ToSchema)]
pub struct RetailerInfo {
    key: String,
    display_name: String,
    hosts: Vec<String>,
    short_hosts: Vec<String>,
    render_mode: RenderMode,
}

/// Retailer catalog with the rule table version.
#[derive(Debug, Serialize, ToSchema)]
pub struct RetailerCatalog {
    version: String,
    retailers: Vec<RetailerInfo>,
}

/// `GET /config/retailers`: List supported retailers.
#[utoipa::path(
    get,
    path = "/config/retailers",
    tag = "System",
    summary = "List supported retailers",
    description = "Returns the retailers in the loaded rule table and how their pages are fetched.",
    responses(
        (status = 200, description = "Retailer catalog", body = RetailerCatalog),
    )
)]
pub async fn retailers_handler(State(state): State<AppState>) -> impl IntoResponse {
    let rules = state.tracking_service.rules();
    let retailers = rules
        .retailers()
        .iter()
        .map(|r| RetailerInfo {
            key: r.key.clone(),
            display_name: r.display_name.clone(),
            hosts: r.hosts.clone(),
            short_hosts: r.short_hosts.clone(),
            render_mode: r.render_mode,
        })
        .collect();
    (
        StatusCode::OK,
        Json(RetailerCatalog {
            version: rules.version().to_string(),
            retailers,
        }),
    )
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/retailers", get(retailers_handler))
}
