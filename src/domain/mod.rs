//! Domain layer: identifiers, tracked entities, prices, and the event system.
//!
//! This module contains the server-side domain model: user and product
//! records as handed out by the tracking store, price parsing and change
//! classification, notification payloads, and the event bus that fans
//! notifications out to WebSocket clients.

pub mod event_bus;
pub mod ids;
pub mod notification;
pub mod price;
pub mod product;
pub mod tracking_event;
pub mod user;

pub use event_bus::EventBus;
pub use ids::{ProductId, UserId};
pub use notification::{CardAction, Notification, NotificationCard, NotificationKind};
pub use price::{ParsedPrice, PriceChange, PriceDirection};
pub use product::Product;
pub use tracking_event::TrackingEvent;
pub use user::User;
