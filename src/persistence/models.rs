//! Inputs and outcomes of tracking store operations.

use serde::Serialize;
use utoipa::ToSchema;

/// Product data gathered by a successful fetch and extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    /// Canonical product ID (unique key).
    pub canonical_id: String,
    /// Retailer key from the rule table.
    pub retailer: String,
    /// Canonical page URL.
    pub source_url: String,
    /// Extracted title, if any.
    pub display_name: Option<String>,
    /// Extracted price, if any.
    pub price: Option<String>,
}

/// Result of [`super::TrackingStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscribeOutcome {
    /// A new subscription was created.
    Subscribed,
    /// The user already tracked the product.
    AlreadySubscribed,
}

/// Result of [`super::TrackingStore::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    /// There was no such subscription.
    NotSubscribed,
    /// The subscription was removed.
    Unsubscribed {
        /// The product was deleted because nobody tracks it any more.
        product_deleted: bool,
    },
}
