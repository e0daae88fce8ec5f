//! Data Transfer Objects for REST request/response serialization.
//!
//! Prices are serialized exactly as the retailer displays them.

pub mod common_dto;
pub mod tracking_dto;

pub use common_dto::*;
pub use tracking_dto::*;
