//! Sweep execution and the interval loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use utoipa::ToSchema;

use crate::domain::{EventBus, PriceChange, PriceDirection, Product, TrackingEvent};
use crate::error::TrackerError;
use crate::extract::{RuleTable, extract_listing};
use crate::fetch::Fetcher;
use crate::notify::NotificationDispatcher;
use crate::persistence::TrackingStore;

/// Per-sweep tally. Every examined product lands in exactly one bucket
/// besides `checked`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepReport {
    /// Products examined.
    pub checked: usize,
    /// Products whose price changed; subscribers were notified.
    pub changed: usize,
    /// Products whose price was unchanged.
    pub unchanged: usize,
    /// Products fetched successfully but without a price.
    pub unavailable: usize,
    /// Products that failed (unsupported retailer, fetch, or store error).
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProductOutcome {
    Changed,
    Unchanged,
    Unavailable,
    Failed,
}

/// Re-checks every tracked product with bounded parallelism.
#[derive(Debug)]
pub struct PollingScheduler {
    store: Arc<dyn TrackingStore>,
    fetcher: Arc<dyn Fetcher>,
    rules: Arc<RuleTable>,
    dispatcher: NotificationDispatcher,
    event_bus: EventBus,
    concurrency: usize,
    sweeping: Mutex<()>,
}

impl PollingScheduler {
    /// Creates a scheduler checking up to `concurrency` products at once.
    #[must_use]
    pub fn new(
        store: Arc<dyn TrackingStore>,
        fetcher: Arc<dyn Fetcher>,
        rules: Arc<RuleTable>,
        dispatcher: NotificationDispatcher,
        event_bus: EventBus,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            fetcher,
            rules,
            dispatcher,
            event_bus,
            concurrency: concurrency.max(1),
            sweeping: Mutex::new(()),
        }
    }

    /// Runs one sweep over every tracked product.
    ///
    /// Per-product failures are logged and counted, never propagated.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::SweepInProgress`] if another sweep is running,
    /// or [`TrackerError::StoreError`] if the product list cannot be read.
    pub async fn run_sweep(&self) -> Result<SweepReport, TrackerError> {
        let Ok(_guard) = self.sweeping.try_lock() else {
            return Err(TrackerError::SweepInProgress);
        };

        let started = tokio::time::Instant::now();
        let products = self.store.list_products().await?;
        tracing::info!(products = products.len(), "sweep started");

        let outcomes: Vec<ProductOutcome> = stream::iter(products)
            .map(|product| self.check_product(product))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = SweepReport {
            checked: outcomes.len(),
            ..SweepReport::default()
        };
        for outcome in outcomes {
            match outcome {
                ProductOutcome::Changed => report.changed += 1,
                ProductOutcome::Unchanged => report.unchanged += 1,
                ProductOutcome::Unavailable => report.unavailable += 1,
                ProductOutcome::Failed => report.failed += 1,
            }
        }

        let _ = self.event_bus.publish(TrackingEvent::SweepCompleted {
            checked: report.checked,
            changed: report.changed,
            failed: report.failed,
            timestamp: Utc::now(),
        });
        tracing::info!(
            checked = report.checked,
            changed = report.changed,
            unchanged = report.unchanged,
            unavailable = report.unavailable,
            failed = report.failed,
            elapsed_ms = started.elapsed().as_millis(),
            "sweep completed"
        );
        Ok(report)
    }

    /// Spawns the interval loop. The first sweep runs one `period` after
    /// start; ticks that fire while a sweep is running are skipped.
    #[must_use]
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match self.run_sweep().await {
                    Ok(_) => {}
                    Err(TrackerError::SweepInProgress) => {
                        tracing::debug!("interval tick skipped, sweep in progress");
                    }
                    Err(e) => tracing::error!(error = %e, "sweep failed"),
                }
            }
        })
    }

    async fn check_product(&self, product: Product) -> ProductOutcome {
        let Some(rules) = self
            .rules
            .get(&product.retailer)
            .or_else(|| self.rules.match_url(&product.source_url))
        else {
            tracing::warn!(
                canonical_id = %product.canonical_id,
                retailer = %product.retailer,
                "unsupported retailer, skipping"
            );
            return ProductOutcome::Failed;
        };

        let page = match self.fetcher.fetch(&product.source_url, rules.render_mode).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(
                    canonical_id = %product.canonical_id,
                    timeout = e.is_timeout(),
                    error = %e,
                    "fetch failed"
                );
                return ProductOutcome::Failed;
            }
        };
        let price = extract_listing(&page.html, rules).price;

        let now = Utc::now();
        let result = match price {
            None => {
                tracing::info!(canonical_id = %product.canonical_id, "price unavailable");
                self.store
                    .mark_checked(product.id, now)
                    .await
                    .map(|()| ProductOutcome::Unavailable)
            }
            Some(price) if has_changed(product.last_known_price.as_deref(), &price) => {
                self.record_change(product, price, now).await
            }
            Some(_) => self
                .store
                .mark_checked(product.id, now)
                .await
                .map(|()| ProductOutcome::Unchanged),
        };

        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "store update failed during sweep");
            ProductOutcome::Failed
        })
    }

    async fn record_change(
        &self,
        mut product: Product,
        price: String,
        now: chrono::DateTime<Utc>,
    ) -> Result<ProductOutcome, TrackerError> {
        self.store.update_price(product.id, &price, now).await?;
        let previous = product.last_known_price.replace(price.clone());
        product.last_checked = Some(now);

        let subscribers = self.store.list_subscribers(product.id).await?;
        let report = self
            .dispatcher
            .price_changed(&product, &price, previous.as_deref(), &subscribers)
            .await;

        tracing::info!(
            canonical_id = %product.canonical_id,
            previous = previous.as_deref().unwrap_or("none"),
            %price,
            delivered = report.delivered,
            failed = report.failed,
            "price changed"
        );
        Ok(ProductOutcome::Changed)
    }
}

/// Whether `current` differs from `previous`. Prices that parse are compared
/// by amount so formatting differences do not count as changes.
fn has_changed(previous: Option<&str>, current: &str) -> bool {
    let Some(previous) = previous else {
        return true;
    };
    PriceChange::classify(previous, current).map_or_else(
        || previous != current,
        |change| change.direction != PriceDirection::Unchanged,
    )
}
