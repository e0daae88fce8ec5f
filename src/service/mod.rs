//! Service layer: business logic orchestration.
//!
//! [`TrackingService`] runs the interactive track/untrack flow, gated per
//! user by the [`SlidingWindowLimiter`], and emits events through the
//! [`super::domain::EventBus`].

pub mod rate_limiter;
pub mod tracking_service;

pub use rate_limiter::{RateDecision, SlidingWindowLimiter};
pub use tracking_service::{TrackOutcome, TrackerStats, TrackingService, UntrackOutcome};
