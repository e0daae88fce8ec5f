//! Notification formatting and delivery.
//!
//! The [`NotificationDispatcher`] turns tracking outcomes and price changes
//! into [`crate::domain::Notification`]s and hands each one to a
//! [`NotificationChannel`]. Recipients are delivered independently; a
//! failure for one is logged and never blocks the others.

pub mod card;
pub mod channel;
pub mod dispatcher;

pub use channel::{BroadcastChannel, FanoutChannel, NotificationChannel, WebhookChannel};
pub use dispatcher::{DeliveryReport, NotificationDispatcher};

/// Errors raised by a delivery channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Transport failure talking to the channel endpoint.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("channel endpoint returned status {0}")]
    Status(u16),

    /// Some inner channels of a fanout failed.
    #[error("{failed} of {total} channels failed")]
    Partial {
        /// Channels that failed.
        failed: usize,
        /// Channels attempted.
        total: usize,
    },
}
