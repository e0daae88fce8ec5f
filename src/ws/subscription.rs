//! Per-connection subscription manager.
//!
//! Tracks which recipients a WebSocket client listens for and provides
//! server-side event filtering.

use std::collections::HashSet;

/// Manages the set of recipient subscriptions for a single WebSocket
/// connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed external IDs. If `subscribe_all` is true, this set is ignored.
    recipients: HashSet<String>,
    /// Whether the client subscribes to every event (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds recipients to the subscription set. `"*"` enables the wildcard.
    pub fn subscribe<'a>(&mut self, recipients: impl IntoIterator<Item = &'a str>) {
        for recipient in recipients {
            if recipient == "*" {
                self.subscribe_all = true;
            } else {
                self.recipients.insert(recipient.to_string());
            }
        }
    }

    /// Removes recipients from the subscription set. `"*"` clears the
    /// wildcard.
    pub fn unsubscribe<'a>(&mut self, recipients: impl IntoIterator<Item = &'a str>) {
        for recipient in recipients {
            if recipient == "*" {
                self.subscribe_all = false;
            } else {
                self.recipients.remove(recipient);
            }
        }
    }

    /// Returns `true` if an event addressed to `recipient` passes the
    /// filter. Unaddressed events only reach wildcard subscribers.
    #[must_use]
    pub fn matches(&self, recipient: Option<&str>) -> bool {
        self.subscribe_all || recipient.is_some_and(|r| self.recipients.contains(r))
    }

    /// Returns the number of explicitly subscribed recipients.
    #[must_use]
    pub fn count(&self) -> usize {
        self.recipients.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_matches_nothing() {
        let mgr = SubscriptionManager::new();
        assert!(!mgr.matches(Some("42")));
        assert!(!mgr.matches(None));
    }

    #[test]
    fn subscribe_specific_recipient() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(["42"]);
        assert!(mgr.matches(Some("42")));
        assert!(!mgr.matches(Some("7")));
        assert!(!mgr.matches(None));
    }

    #[test]
    fn wildcard_matches_everything() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(["*"]);
        assert!(mgr.matches(Some("42")));
        assert!(mgr.matches(None));
        assert_eq!(mgr.count(), 0);
    }

    #[test]
    fn unsubscribe_removes_recipient_and_wildcard() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(["42", "*"]);
        mgr.unsubscribe(["*"]);
        assert!(mgr.matches(Some("42")));
        assert!(!mgr.is_subscribed_all());
        mgr.unsubscribe(["42"]);
        assert!(!mgr.matches(Some("42")));
    }
}
