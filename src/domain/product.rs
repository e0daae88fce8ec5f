//! Tracked product records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ProductId;

/// A unique tracked item.
///
/// The canonical ID is unique across the store. A row exists only while at
/// least one subscription references it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    /// Internal identifier.
    pub id: ProductId,
    /// Retailer-assigned identifier (ASIN, PID, ...).
    pub canonical_id: String,
    /// Rule-table key of the retailer selling the product.
    pub retailer: String,
    /// Canonical URL the price is re-fetched from.
    pub source_url: String,
    /// Best-effort product title.
    pub display_name: Option<String>,
    /// Last extracted price, formatted as shown by the retailer.
    pub last_known_price: Option<String>,
    /// When the polling scheduler last looked at this product.
    pub last_checked: Option<DateTime<Utc>>,
    /// When the product was first tracked.
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Display name, or a generic label when the title was never extracted.
    #[must_use]
    pub fn name_or_default(&self) -> &str {
        self.display_name.as_deref().unwrap_or("Product")
    }
}
