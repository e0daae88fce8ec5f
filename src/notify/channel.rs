//! Delivery channels for notifications.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::ChannelError;
use crate::domain::{EventBus, Notification, TrackingEvent};

/// Delivers a notification to its recipient.
#[async_trait]
pub trait NotificationChannel: std::fmt::Debug + Send + Sync {
    /// Short channel name used in logs.
    fn name(&self) -> &'static str;

    /// Delivers one notification.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] if delivery fails.
    async fn deliver(&self, notification: &Notification) -> Result<(), ChannelError>;
}

/// Publishes notifications on the [`EventBus`] for WebSocket clients.
#[derive(Debug, Clone)]
pub struct BroadcastChannel {
    event_bus: EventBus,
}

impl BroadcastChannel {
    /// Creates a channel publishing on `event_bus`.
    #[must_use]
    pub const fn new(event_bus: EventBus) -> Self {
        Self { event_bus }
    }
}

#[async_trait]
impl NotificationChannel for BroadcastChannel {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), ChannelError> {
        let receivers = self.event_bus.publish(TrackingEvent::NotificationIssued {
            notification: notification.clone(),
        });
        tracing::debug!(
            recipient = %notification.recipient,
            receivers,
            "notification broadcast"
        );
        Ok(())
    }
}

/// POSTs each notification as JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    client: Client,
    url: String,
}

impl WebhookChannel {
    /// Creates a webhook channel with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Http`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChannelError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ChannelError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Delivers through every inner channel.
///
/// All channels are attempted; the call fails if any of them failed.
#[derive(Debug, Clone)]
pub struct FanoutChannel {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl FanoutChannel {
    /// Creates a fanout over `channels`.
    #[must_use]
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }
}

#[async_trait]
impl NotificationChannel for FanoutChannel {
    fn name(&self) -> &'static str {
        "fanout"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), ChannelError> {
        let mut failed = 0;
        for channel in &self.channels {
            if let Err(e) = channel.deliver(notification).await {
                failed += 1;
                tracing::warn!(
                    channel = channel.name(),
                    recipient = %notification.recipient,
                    error = %e,
                    "channel delivery failed"
                );
            }
        }
        if failed > 0 {
            return Err(ChannelError::Partial {
                failed,
                total: self.channels.len(),
            });
        }
        Ok(())
    }
}
