//! Subscriber records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::UserId;

/// A subscriber known to the tracking store.
///
/// Created on first interaction and never deleted, so history survives
/// a user dropping all of their subscriptions. Only `display_name` is ever
/// refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Internal identifier.
    pub id: UserId,
    /// Stable identity assigned by the delivery channel (chat id, handle).
    pub external_id: String,
    /// Last display name seen for this user.
    pub display_name: Option<String>,
    /// When the user was first seen.
    pub created_at: DateTime<Utc>,
}
