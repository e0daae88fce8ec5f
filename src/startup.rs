//! Component wiring shared by the `serve` and `sweep` commands.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::config::TrackerConfig;
use crate::domain::EventBus;
use crate::error::TrackerError;
use crate::extract::RuleTable;
use crate::fetch::{ContentFetcher, Fetcher};
use crate::notify::{
    BroadcastChannel, FanoutChannel, NotificationChannel, NotificationDispatcher, WebhookChannel,
};
use crate::persistence::{MemoryStore, PostgresStore, TrackingStore};
use crate::scheduler::PollingScheduler;
use crate::service::{SlidingWindowLimiter, TrackingService};
use crate::ws::handler::ws_handler;

/// Timeout for a single outbound webhook delivery.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the application state from configuration: rule table, content
/// fetcher, store (PostgreSQL or in-memory), and notification channels.
///
/// # Errors
///
/// Returns [`TrackerError::Config`] for an invalid rule table or HTTP
/// client, and [`TrackerError::StoreError`] if the database is unreachable
/// or migrations fail.
pub async fn build_state(config: &TrackerConfig) -> Result<AppState, TrackerError> {
    let rules = RuleTable::load(config.retailer_rules_path.as_deref())?;
    tracing::info!(
        version = rules.version(),
        retailers = rules.retailers().len(),
        "retailer rules loaded"
    );

    let fetcher = ContentFetcher::from_config(config)
        .map_err(|e| TrackerError::Config(format!("fetcher: {e}")))?;
    tracing::info!(render_slots = fetcher.gate().capacity(), "content fetcher ready");

    let store: Arc<dyn TrackingStore> = if config.persistence_enabled {
        Arc::new(PostgresStore::connect(config).await?)
    } else {
        tracing::warn!("persistence disabled, tracked products live in memory only");
        Arc::new(MemoryStore::new())
    };

    assemble(config, store, Arc::new(fetcher), Arc::new(rules))
}

/// Wires services around already-built store, fetcher, and rules.
///
/// # Errors
///
/// Returns [`TrackerError::Config`] if the webhook client cannot be built.
pub fn assemble(
    config: &TrackerConfig,
    store: Arc<dyn TrackingStore>,
    fetcher: Arc<dyn Fetcher>,
    rules: Arc<RuleTable>,
) -> Result<AppState, TrackerError> {
    let event_bus = EventBus::new(config.event_bus_capacity);

    let mut channels: Vec<Arc<dyn NotificationChannel>> =
        vec![Arc::new(BroadcastChannel::new(event_bus.clone()))];
    if let Some(url) = &config.notify_webhook_url {
        let webhook = WebhookChannel::new(url.clone(), WEBHOOK_TIMEOUT)
            .map_err(|e| TrackerError::Config(format!("webhook channel: {e}")))?;
        tracing::info!(url = %url, "webhook notifications enabled");
        channels.push(Arc::new(webhook));
    }
    let dispatcher = NotificationDispatcher::new(Arc::new(FanoutChannel::new(channels)));

    let limiter = Arc::new(SlidingWindowLimiter::new(
        config.rate_limit_max_actions,
        config.rate_limit_window(),
    ));

    let tracking_service = Arc::new(TrackingService::new(
        Arc::clone(&store),
        Arc::clone(&fetcher),
        Arc::clone(&rules),
        limiter,
        dispatcher.clone(),
        event_bus.clone(),
    ));
    let scheduler = Arc::new(PollingScheduler::new(
        store,
        fetcher,
        rules,
        dispatcher,
        event_bus.clone(),
        config.sweep_concurrency,
    ));

    Ok(AppState {
        tracking_service,
        scheduler,
        event_bus,
    })
}

/// Builds the HTTP router: REST API, `/ws`, and the tower-http layers.
///
/// `request_timeout` bounds every route except the sweep trigger.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let bounded = api::build_router()
        .route("/ws", get(ws_handler))
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .merge(bounded)
        .merge(api::build_long_running_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
