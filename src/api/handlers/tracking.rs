//! Tracking handlers: track, untrack, card callbacks, listing, stats.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CallbackRequest, ProductDto, StatsResponse, TrackRequest, TrackResponse,
    TrackedProductsResponse, UntrackResponse,
};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, TrackerError};

/// `POST /track`: Start tracking the product linked in a message.
///
/// # Errors
///
/// Returns [`TrackerError`] when the link is unsupported, the page cannot
/// be fetched, no price is found, or the user is rate limited.
#[utoipa::path(
    post,
    path = "/api/v1/track",
    tag = "Tracking",
    summary = "Track a product",
    description = "Resolves the link in `text`, identifies the retailer and product, fetches the current price, subscribes the user, and sends the tracking-started card.",
    request_body = TrackRequest,
    responses(
        (status = 201, description = "Product tracked", body = TrackResponse),
        (status = 400, description = "Empty input or no link", body = ErrorResponse),
        (status = 422, description = "Unsupported retailer, no product ID, or no price", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse),
        (status = 502, description = "Fetch failed", body = ErrorResponse),
        (status = 504, description = "Fetch timed out", body = ErrorResponse),
    )
)]
pub async fn track(
    State(state): State<AppState>,
    Json(req): Json<TrackRequest>,
) -> Result<impl IntoResponse, TrackerError> {
    let tracked = state
        .tracking_service
        .track(&req.external_id, req.display_name.as_deref(), &req.text)
        .await?;

    let response = TrackResponse {
        outcome: tracked.outcome,
        product: tracked.product.into(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// `DELETE /users/{external_id}/products/{canonical_id}`: Stop tracking.
///
/// # Errors
///
/// Returns [`TrackerError::RateLimited`] or a store error.
#[utoipa::path(
    delete,
    path = "/api/v1/users/{external_id}/products/{canonical_id}",
    tag = "Tracking",
    summary = "Stop tracking a product",
    description = "Removes the subscription. The product is deleted when no other user tracks it.",
    params(
        ("external_id" = String, Path, description = "External user identity"),
        ("canonical_id" = String, Path, description = "Retailer product ID"),
    ),
    responses(
        (status = 200, description = "Untrack result", body = UntrackResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse),
    )
)]
pub async fn untrack(
    State(state): State<AppState>,
    Path((external_id, canonical_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, TrackerError> {
    let (outcome, product_deleted) = state
        .tracking_service
        .untrack(&external_id, &canonical_id)
        .await?;
    Ok(Json(UntrackResponse {
        outcome,
        product_deleted,
    }))
}

/// `POST /callback`: Relay a card action such as "Stop Tracking".
///
/// # Errors
///
/// Returns [`TrackerError::InvalidRequest`] for unknown callback data.
#[utoipa::path(
    post,
    path = "/api/v1/callback",
    tag = "Tracking",
    summary = "Handle a card action",
    description = "Executes the action encoded in a notification card's callback data.",
    request_body = CallbackRequest,
    responses(
        (status = 200, description = "Action result", body = UntrackResponse),
        (status = 400, description = "Unknown callback", body = ErrorResponse),
    )
)]
pub async fn callback(
    State(state): State<AppState>,
    Json(req): Json<CallbackRequest>,
) -> Result<impl IntoResponse, TrackerError> {
    let (outcome, product_deleted) = state
        .tracking_service
        .handle_callback(&req.external_id, &req.data)
        .await?;
    Ok(Json(UntrackResponse {
        outcome,
        product_deleted,
    }))
}

/// `GET /users/{external_id}/products`: Products a user tracks.
///
/// # Errors
///
/// Returns [`TrackerError::UserNotFound`] for unknown users.
#[utoipa::path(
    get,
    path = "/api/v1/users/{external_id}/products",
    tag = "Tracking",
    summary = "List tracked products",
    params(
        ("external_id" = String, Path, description = "External user identity"),
    ),
    responses(
        (status = 200, description = "Tracked products", body = TrackedProductsResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse),
    )
)]
pub async fn list_tracked(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> Result<impl IntoResponse, TrackerError> {
    let products = state.tracking_service.list_tracked(&external_id).await?;
    Ok(Json(TrackedProductsResponse {
        external_id,
        data: products.into_iter().map(ProductDto::from).collect(),
    }))
}

/// `GET /stats`: User and product counts.
///
/// # Errors
///
/// Returns [`TrackerError::StoreError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    tag = "Tracking",
    summary = "Store statistics",
    responses(
        (status = 200, description = "Counts", body = StatsResponse),
    )
)]
pub async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, TrackerError> {
    let stats = state.tracking_service.stats().await?;
    Ok(Json(StatsResponse::from(stats)))
}

/// Tracking routes (mounted under `/api/v1`).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/track", post(track))
        .route("/callback", post(callback))
        .route("/users/{external_id}/products", get(list_tracked))
        .route(
            "/users/{external_id}/products/{canonical_id}",
            delete(untrack),
        )
        .route("/stats", get(stats))
}
