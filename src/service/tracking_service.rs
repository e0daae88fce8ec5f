//! Tracking service: the request flow behind "track this link".

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use super::rate_limiter::{RateDecision, SlidingWindowLimiter};
use crate::domain::notification::parse_stop_callback;
use crate::domain::{EventBus, Product, TrackingEvent};
use crate::error::TrackerError;
use crate::extract::rules::host_of;
use crate::extract::{RetailerRules, RuleTable, extract_listing, extract_product_id};
use crate::fetch::Fetcher;
use crate::fetch::canonicalize::extract_first_url;
use crate::notify::NotificationDispatcher;
use crate::persistence::{NewProduct, SubscribeOutcome, TrackingStore, UnsubscribeOutcome};

/// Result of a successful track request.
#[derive(Debug, Clone)]
pub struct TrackOutcome {
    /// Whether the subscription is new.
    pub outcome: SubscribeOutcome,
    /// The tracked product after the update.
    pub product: Product,
}

/// Result of an untrack request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UntrackOutcome {
    /// The subscription was removed.
    Unsubscribed,
    /// There was nothing to remove.
    NotSubscribed,
}

/// Aggregate counts across the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerStats {
    /// Known users.
    pub users: u64,
    /// Tracked products.
    pub products: u64,
}

/// Orchestrates canonicalization, fetching, extraction, storage and the
/// initial notification for inbound track requests.
///
/// Holds only shared handles; every request is independent.
#[derive(Debug, Clone)]
pub struct TrackingService {
    store: Arc<dyn TrackingStore>,
    fetcher: Arc<dyn Fetcher>,
    rules: Arc<RuleTable>,
    limiter: Arc<SlidingWindowLimiter>,
    dispatcher: NotificationDispatcher,
    event_bus: EventBus,
}

impl TrackingService {
    /// Creates a new `TrackingService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn TrackingStore>,
        fetcher: Arc<dyn Fetcher>,
        rules: Arc<RuleTable>,
        limiter: Arc<SlidingWindowLimiter>,
        dispatcher: NotificationDispatcher,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            fetcher,
            rules,
            limiter,
            dispatcher,
            event_bus,
        }
    }

    /// Returns the shared store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TrackingStore> {
        &self.store
    }

    /// Returns the compiled rule table.
    #[must_use]
    pub fn rules(&self) -> &Arc<RuleTable> {
        &self.rules
    }

    /// Starts tracking the product linked in `text` for `external_id`.
    ///
    /// The product is created (or refreshed) only when a price was found.
    /// The "tracking started" card is sent for new and existing
    /// subscriptions alike.
    ///
    /// # Errors
    ///
    /// - [`TrackerError::InvalidRequest`] for empty input or no link.
    /// - [`TrackerError::RateLimited`] when the user exceeded the window.
    /// - [`TrackerError::UnsupportedRetailer`] for hosts outside the rule table.
    /// - [`TrackerError::IdentityNotFound`] when no product ID is in the URL.
    /// - [`TrackerError::FetchTimeout`] / [`TrackerError::FetchFailed`] when
    ///   the page cannot be fetched.
    /// - [`TrackerError::PriceUnavailable`] when the page has no price.
    /// - [`TrackerError::StoreError`] on storage failure.
    pub async fn track(
        &self,
        external_id: &str,
        display_name: Option<&str>,
        text: &str,
    ) -> Result<TrackOutcome, TrackerError> {
        let external_id = external_id.trim();
        if external_id.is_empty() {
            return Err(TrackerError::InvalidRequest("external_id is empty".to_string()));
        }
        if text.trim().is_empty() {
            return Err(TrackerError::InvalidRequest("text is empty".to_string()));
        }

        self.admit(external_id).await?;

        let resolved = self.fetcher.resolve_redirects(text).await;
        let url = extract_first_url(&resolved)
            .ok_or_else(|| TrackerError::InvalidRequest("no link found in text".to_string()))?
            .to_string();

        let (rules, url) = self.match_retailer(url).await?;
        let canonical_id = extract_product_id(&url, rules)?;

        let page = self.fetcher.fetch(&url, rules.render_mode).await?;
        let extraction = extract_listing(&page.html, rules);

        let user = self
            .store
            .get_or_create_user(external_id, display_name)
            .await?;

        let Some(price) = extraction.price else {
            tracing::info!(%canonical_id, retailer = %rules.key, "price unavailable, nothing tracked");
            return Err(TrackerError::PriceUnavailable(canonical_id));
        };

        let new = NewProduct {
            canonical_id,
            retailer: rules.key.clone(),
            source_url: url,
            display_name: extraction.title,
            price: Some(price.clone()),
        };
        let (product, outcome) = self.store.track_product(user.id, &new).await?;

        self.dispatcher
            .tracking_started(external_id, &product, &price)
            .await;

        tracing::info!(
            external_id,
            canonical_id = %product.canonical_id,
            %price,
            ?outcome,
            "tracking started"
        );
        Ok(TrackOutcome { outcome, product })
    }

    /// Stops `external_id` tracking `canonical_id`.
    ///
    /// Unknown users and products yield [`UntrackOutcome::NotSubscribed`].
    /// Returns whether the product row was deleted.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::RateLimited`] or [`TrackerError::StoreError`].
    pub async fn untrack(
        &self,
        external_id: &str,
        canonical_id: &str,
    ) -> Result<(UntrackOutcome, bool), TrackerError> {
        self.admit(external_id).await?;

        let Some(user) = self.store.find_user(external_id).await? else {
            return Ok((UntrackOutcome::NotSubscribed, false));
        };
        let Some(product) = self.store.find_product(canonical_id).await? else {
            return Ok((UntrackOutcome::NotSubscribed, false));
        };

        match self.store.unsubscribe(user.id, product.id).await? {
            UnsubscribeOutcome::NotSubscribed => Ok((UntrackOutcome::NotSubscribed, false)),
            UnsubscribeOutcome::Unsubscribed { product_deleted } => {
                let _ = self.event_bus.publish(TrackingEvent::TrackingStopped {
                    recipient: external_id.to_string(),
                    canonical_id: canonical_id.to_string(),
                    product_deleted,
                    timestamp: Utc::now(),
                });
                tracing::info!(external_id, canonical_id, product_deleted, "tracking stopped");
                Ok((UntrackOutcome::Unsubscribed, product_deleted))
            }
        }
    }

    /// Handles a card action callback such as `stop_B0CXYZ1234`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidRequest`] for unknown callback data,
    /// otherwise the errors of [`Self::untrack`].
    pub async fn handle_callback(
        &self,
        external_id: &str,
        data: &str,
    ) -> Result<(UntrackOutcome, bool), TrackerError> {
        let canonical_id = parse_stop_callback(data)
            .ok_or_else(|| TrackerError::InvalidRequest(format!("unknown callback: {data}")))?;
        self.untrack(external_id, canonical_id).await
    }

    /// Products tracked by `external_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::UserNotFound`] for unknown users.
    pub async fn list_tracked(&self, external_id: &str) -> Result<Vec<Product>, TrackerError> {
        let user = self
            .store
            .find_user(external_id)
            .await?
            .ok_or_else(|| TrackerError::UserNotFound(external_id.to_string()))?;
        self.store.list_subscriptions(user.id).await
    }

    /// User and product counts.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::StoreError`] on storage failure.
    pub async fn stats(&self) -> Result<TrackerStats, TrackerError> {
        Ok(TrackerStats {
            users: self.store.count_users().await?,
            products: self.store.count_products().await?,
        })
    }

    async fn admit(&self, external_id: &str) -> Result<(), TrackerError> {
        match self.limiter.check(external_id).await {
            RateDecision::Accepted => Ok(()),
            RateDecision::Rejected { retry_after } => Err(TrackerError::RateLimited {
                retry_after_ms: u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Finds the retailer for `url`, resolving script-driven short links
    /// through the rendered fetch path.
    async fn match_retailer(&self, url: String) -> Result<(&RetailerRules, String), TrackerError> {
        if let Some(rules) = self.rules.match_url(&url) {
            return Ok((rules, url));
        }

        if self.rules.match_short_url(&url).is_some() {
            let resolved = self.fetcher.resolve_rendered(&url).await?;
            tracing::debug!(from = %url, to = %resolved, "short link resolved by rendering");
            if let Some(rules) = self.rules.match_url(&resolved) {
                return Ok((rules, resolved));
            }
        }

        Err(TrackerError::UnsupportedRetailer(
            host_of(&url).unwrap_or(url),
        ))
    }
}
