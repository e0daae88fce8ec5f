//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` pushes notification cards and tracking
//! events to subscribed clients and accepts card action callbacks.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
