//! Builds notifications and fans them out to recipients.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;

use super::NotificationChannel;
use super::card;
use crate::domain::{Notification, NotificationCard, NotificationKind, Product, User};

/// Per-call delivery tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Recipients whose delivery succeeded.
    pub delivered: usize,
    /// Recipients whose delivery failed.
    pub failed: usize,
}

/// Formats cards and delivers them through a [`NotificationChannel`].
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    channel: Arc<dyn NotificationChannel>,
}

impl NotificationDispatcher {
    /// Creates a dispatcher delivering through `channel`.
    #[must_use]
    pub fn new(channel: Arc<dyn NotificationChannel>) -> Self {
        Self { channel }
    }

    /// Sends the "tracking started" card for `product` to `recipient`.
    pub async fn tracking_started(
        &self,
        recipient: &str,
        product: &Product,
        price: &str,
    ) -> DeliveryReport {
        let now = Utc::now();
        let card = card::tracking_started(product, price, now);
        self.deliver_all(
            NotificationKind::TrackingStarted,
            product,
            &card,
            std::iter::once(recipient),
        )
        .await
    }

    /// Sends the price-change card for `product` to every subscriber.
    pub async fn price_changed(
        &self,
        product: &Product,
        price: &str,
        previous: Option<&str>,
        subscribers: &[User],
    ) -> DeliveryReport {
        let now = Utc::now();
        let card = card::price_changed(product, price, previous, now);
        self.deliver_all(
            NotificationKind::PriceChanged,
            product,
            &card,
            subscribers.iter().map(|u| u.external_id.as_str()),
        )
        .await
    }

    async fn deliver_all<'a>(
        &self,
        kind: NotificationKind,
        product: &Product,
        card: &NotificationCard,
        recipients: impl Iterator<Item = &'a str>,
    ) -> DeliveryReport {
        let created_at = Utc::now();
        let notifications: Vec<Notification> = recipients
            .map(|recipient| Notification {
                recipient: recipient.to_string(),
                kind,
                canonical_id: product.canonical_id.clone(),
                card: card.clone(),
                created_at,
            })
            .collect();

        let results = join_all(notifications.iter().map(|n| self.channel.deliver(n))).await;

        let mut report = DeliveryReport::default();
        for (notification, result) in notifications.iter().zip(results) {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        channel = self.channel.name(),
                        recipient = %notification.recipient,
                        canonical_id = %notification.canonical_id,
                        error = %e,
                        "notification delivery failed"
                    );
                }
            }
        }
        report
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod tests {
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;
    use crate::domain::{ProductId, UserId};
    use crate::notify::ChannelError;

    /// Channel that records deliveries and fails for chosen recipients.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingChannel {
        pub(crate) delivered: Mutex<Vec<Notification>>,
        pub(crate) fail_for: Vec<String>,
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn deliver(&self, notification: &Notification) -> Result<(), ChannelError> {
            if self.fail_for.contains(&notification.recipient) {
                return Err(ChannelError::Status(503));
            }
            self.delivered.lock().await.push(notification.clone());
            Ok(())
        }
    }

    fn product() -> Product {
        Product {
            id: ProductId::new(),
            canonical_id: "B0CXYZ1234".to_string(),
            retailer: "amazon".to_string(),
            source_url: "https://www.amazon.in/dp/B0CXYZ1234".to_string(),
            display_name: Some("Acme Phone".to_string()),
            last_known_price: Some("₹900.00".to_string()),
            last_checked: None,
            created_at: Utc::now(),
        }
    }

    fn user(external_id: &str) -> User {
        User {
            id: UserId::new(),
            external_id: external_id.to_string(),
            display_name: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn failure_for_one_recipient_does_not_block_others() {
        let channel = Arc::new(RecordingChannel {
            fail_for: vec!["2".to_string()],
            ..RecordingChannel::default()
        });
        let dispatcher = NotificationDispatcher::new(Arc::clone(&channel) as Arc<dyn NotificationChannel>);

        let report = dispatcher
            .price_changed(
                &product(),
                "₹900.00",
                Some("₹1000.00"),
                &[user("1"), user("2"), user("3")],
            )
            .await;

        assert_eq!(report, DeliveryReport { delivered: 2, failed: 1 });
        let delivered = channel.delivered.lock().await;
        assert_eq!(delivered.len(), 2);
        assert!(delivered.iter().all(|n| n.kind == NotificationKind::PriceChanged));
        assert!(
            delivered
                .iter()
                .all(|n| n.card.headline == "Product Price is decreased by ₹100.")
        );
    }

    #[tokio::test]
    async fn tracking_started_targets_one_recipient() {
        let channel = Arc::new(RecordingChannel::default());
        let dispatcher = NotificationDispatcher::new(Arc::clone(&channel) as Arc<dyn NotificationChannel>);

        let report = dispatcher.tracking_started("7", &product(), "₹900.00").await;
        assert_eq!(report.delivered, 1);

        let delivered = channel.delivered.lock().await;
        let Some(first) = delivered.first() else {
            panic!("one notification delivered");
        };
        assert_eq!(first.recipient, "7");
        assert_eq!(first.kind, NotificationKind::TrackingStarted);
        assert_eq!(first.canonical_id, "B0CXYZ1234");
    }
}
