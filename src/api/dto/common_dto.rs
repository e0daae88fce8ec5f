//! Shared DTO types used across multiple endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::Product;
use crate::service::TrackerStats;

/// A tracked product as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductDto {
    /// Internal product UUID.
    pub id: uuid::Uuid,
    /// Retailer-assigned identifier (e.g. an ASIN).
    pub canonical_id: String,
    /// Rule-table key of the retailer.
    pub retailer: String,
    /// URL the price is re-fetched from.
    pub source_url: String,
    /// Product title, when extracted.
    pub display_name: Option<String>,
    /// Last extracted price as displayed by the retailer.
    pub last_known_price: Option<String>,
    /// Last polling check.
    pub last_checked: Option<DateTime<Utc>>,
    /// First tracked.
    pub created_at: DateTime<Utc>,
}

impl From<Product> for ProductDto {
    fn from(p: Product) -> Self {
        Self {
            id: p.id.into(),
            canonical_id: p.canonical_id,
            retailer: p.retailer,
            source_url: p.source_url,
            display_name: p.display_name,
            last_known_price: p.last_known_price,
            last_checked: p.last_checked,
            created_at: p.created_at,
        }
    }
}

/// Response body for `GET /stats`.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Known users.
    pub users: u64,
    /// Tracked products.
    pub products: u64,
}

impl From<TrackerStats> for StatsResponse {
    fn from(s: TrackerStats) -> Self {
        Self {
            users: s.users,
            products: s.products,
        }
    }
}
