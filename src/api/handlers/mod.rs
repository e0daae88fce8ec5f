//! REST endpoint handlers organized by resource.

pub mod sweep;
pub mod system;
pub mod tracking;

use axum::Router;

use crate::app_state::AppState;

/// Composes the request/response routes mounted under `/api/v1`.
///
/// The sweep trigger is not included; see [`sweep::routes`].
pub fn routes() -> Router<AppState> {
    Router::new().merge(tracking::routes())
}
