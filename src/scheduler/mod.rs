//! Price-change polling.
//!
//! [`PollingScheduler::run_sweep`] re-fetches every tracked product, records
//! price changes, and notifies subscribers. The same sweep backs the
//! interval task started by `serve`, `POST /api/v1/sweep`, and the `sweep`
//! CLI subcommand. At most one sweep runs at a time.

pub mod sweep;

pub use sweep::{PollingScheduler, SweepReport};
