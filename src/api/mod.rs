//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All endpoints are mounted under `/api/v1` except `/health` and
//! `/config/retailers`. `POST /api/v1/sweep` lives in
//! [`build_long_running_router`] so it can run past the request timeout.
//! With the `swagger-ui` feature the OpenAPI document
//! is served at `/api-docs/openapi.json` with a UI at `/swagger-ui`.

pub mod dto;
pub mod handlers;
pub mod openapi;

use axum::Router;

use crate::app_state::AppState;

/// Builds the API router for every REST endpoint except the sweep trigger.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
    };

    router
}

/// Routes whose handlers may run longer than the request timeout.
pub fn build_long_running_router() -> Router<AppState> {
    handlers::sweep::routes()
}
