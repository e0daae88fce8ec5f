//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::scheduler::PollingScheduler;
use crate::service::TrackingService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Interactive track/untrack flow.
    pub tracking_service: Arc<TrackingService>,
    /// Polling sweep, shared with the interval task.
    pub scheduler: Arc<PollingScheduler>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}
