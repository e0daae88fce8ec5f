//! # price-tracker
//!
//! Product price tracking service: users share product links, the service
//! resolves them to a canonical retailer product, records the current
//! price, and notifies every subscriber when a periodic sweep observes a
//! change.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── TrackingService + SlidingWindowLimiter (service/)
//!     ├── PollingScheduler (scheduler/)
//!     ├── NotificationDispatcher → channels (notify/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── RuleTable, identity and price extraction (extract/)
//!     ├── Canonicalizer, static and rendered fetchers (fetch/)
//!     │
//!     └── TrackingStore: PostgreSQL or in-memory (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod notify;
pub mod persistence;
pub mod scheduler;
pub mod service;
pub mod startup;
pub mod ws;
