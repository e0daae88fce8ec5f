//! OpenAPI document assembled from the handler annotations.

use utoipa::OpenApi;

use super::dto::{
    CallbackRequest, ProductDto, StatsResponse, TrackRequest, TrackResponse,
    TrackedProductsResponse, UntrackResponse,
};
use super::handlers::{sweep, system, tracking};
use crate::error::{ErrorBody, ErrorResponse};
use crate::fetch::RenderMode;
use crate::persistence::SubscribeOutcome;
use crate::scheduler::SweepReport;
use crate::service::UntrackOutcome;

/// OpenAPI description of the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "price-tracker", description = "Product price tracking service"),
    paths(
        tracking::track,
        tracking::untrack,
        tracking::callback,
        tracking::list_tracked,
        tracking::stats,
        sweep::run_sweep,
        system::health_handler,
        system::retailers_handler,
    ),
    components(schemas(
        TrackRequest,
        TrackResponse,
        UntrackResponse,
        CallbackRequest,
        TrackedProductsResponse,
        ProductDto,
        StatsResponse,
        SubscribeOutcome,
        UntrackOutcome,
        SweepReport,
        RenderMode,
        system::HealthResponse,
        system::RetailerInfo,
        system::RetailerCatalog,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "Tracking", description = "Track and untrack products"),
        (name = "Scheduler", description = "Price polling"),
        (name = "System", description = "Health and configuration"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/api/v1/track",
            "/api/v1/callback",
            "/api/v1/users/{external_id}/products",
            "/api/v1/users/{external_id}/products/{canonical_id}",
            "/api/v1/stats",
            "/api/v1/sweep",
            "/health",
            "/config/retailers",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing {expected}"
            );
        }
    }
}
