//! Notification payloads handed to delivery channels.
//!
//! The core only decides *what* a subscriber is told; rendering for a
//! specific chat platform is the front-end's job. A [`Notification`] is the
//! full contract: recipient, kind, formatted card, and action descriptors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Why the notification was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Sent once when a user starts tracking a product.
    TrackingStarted,
    /// Sent by the polling scheduler when a tracked price moves.
    PriceChanged,
}

/// An interactive control attached to a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CardAction {
    /// Opens a URL in the recipient's client.
    OpenUrl {
        /// Button label.
        label: String,
        /// Target URL.
        url: String,
    },
    /// Sends opaque callback data back to the front-end.
    Callback {
        /// Button label.
        label: String,
        /// Callback payload, e.g. `stop_B0CXYZ1234`.
        data: String,
    },
}

/// Formatted message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NotificationCard {
    /// First line of the message.
    pub headline: String,
    /// Remaining lines, newline separated.
    pub body: String,
    /// Buttons shown under the message.
    pub actions: Vec<CardAction>,
}

/// A card addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    /// External identity of the recipient.
    pub recipient: String,
    /// Why the notification exists.
    pub kind: NotificationKind,
    /// Canonical product ID the card is about.
    pub canonical_id: String,
    /// Formatted content.
    pub card: NotificationCard,
    /// When the card was produced.
    pub created_at: DateTime<Utc>,
}

/// Callback payload carried by the "Stop Tracking" action.
#[must_use]
pub fn stop_callback_data(canonical_id: &str) -> String {
    format!("stop_{canonical_id}")
}

/// Parses a "Stop Tracking" callback payload back into a canonical ID.
#[must_use]
pub fn parse_stop_callback(data: &str) -> Option<&str> {
    data.strip_prefix("stop_").filter(|id| !id.is_empty())
}
