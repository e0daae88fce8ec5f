//! Tracking DTOs: track, untrack, callback, and list.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common_dto::ProductDto;
use crate::persistence::SubscribeOutcome;
use crate::service::UntrackOutcome;

/// Request body for `POST /track`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TrackRequest {
    /// External identity of the requesting user (e.g. a chat ID).
    pub external_id: String,
    /// Display name stored with the user.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Free text containing a product link, possibly shortened.
    pub text: String,
}

/// Response body for `POST /track` (201 Created).
#[derive(Debug, Serialize, ToSchema)]
pub struct TrackResponse {
    /// Whether the subscription is new.
    pub outcome: SubscribeOutcome,
    /// The tracked product.
    pub product: ProductDto,
}

/// Response body for untrack and callback requests.
#[derive(Debug, Serialize, ToSchema)]
pub struct UntrackResponse {
    /// Whether a subscription was removed.
    pub outcome: UntrackOutcome,
    /// Whether the product row was removed because nobody tracks it.
    pub product_deleted: bool,
}

/// Request body for `POST /callback`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CallbackRequest {
    /// External identity of the user who pressed the action.
    pub external_id: String,
    /// Callback data from the card action (e.g. `stop_B0CXYZ1234`).
    pub data: String,
}

/// Response body for `GET /users/{external_id}/products`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TrackedProductsResponse {
    /// External identity of the user.
    pub external_id: String,
    /// Products the user tracks, oldest first.
    pub data: Vec<ProductDto>,
}
