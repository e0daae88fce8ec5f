//! Domain events reflecting tracking state changes.
//!
//! Events are broadcast through the [`super::EventBus`] to WebSocket
//! subscribers. Recipient-scoped events reach only connections subscribed
//! to that recipient (or to `"*"`); sweep summaries reach wildcard
//! subscribers only.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Notification;

/// Domain event emitted by the tracking service and the polling scheduler.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum TrackingEvent {
    /// A notification card was issued to a recipient.
    NotificationIssued {
        /// The card and its addressee.
        notification: Notification,
    },

    /// A recipient stopped tracking a product.
    TrackingStopped {
        /// External identity of the user.
        recipient: String,
        /// Canonical product ID.
        canonical_id: String,
        /// Whether the product row was removed because nobody tracks it.
        product_deleted: bool,
        /// When tracking stopped.
        timestamp: DateTime<Utc>,
    },

    /// A polling sweep finished.
    SweepCompleted {
        /// Products examined.
        checked: usize,
        /// Products whose price changed.
        changed: usize,
        /// Products fetched and failed for any reason.
        failed: usize,
        /// Completion timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl TrackingEvent {
    /// Returns the recipient this event is addressed to, if any.
    #[must_use]
    pub fn recipient(&self) -> Option<&str> {
        match self {
            Self::NotificationIssued { notification } => Some(&notification.recipient),
            Self::TrackingStopped { recipient, .. } => Some(recipient),
            Self::SweepCompleted { .. } => None,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::NotificationIssued { .. } => "notification_issued",
            Self::TrackingStopped { .. } => "tracking_stopped",
            Self::SweepCompleted { .. } => "sweep_completed",
        }
    }
}
