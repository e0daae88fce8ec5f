//! Retailer rule table and markup extraction.
//!
//! The [`RuleTable`] is compiled once at startup from `rules/retailers.json`
//! (or a file named by `RETAILER_RULES_PATH`) and shared immutably. The
//! identity and price extractors are pure functions over a URL or markup
//! plus one retailer's [`RetailerRules`].

pub mod identity;
pub mod price;
pub mod rules;

pub use identity::{IdentityNotFound, extract_product_id};
pub use price::{Extraction, extract_listing};
pub use rules::{IdPattern, PriceCandidate, RetailerRules, RuleTable};

/// Errors raised while loading or compiling the rule table.
#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    /// The rules file could not be read.
    #[error("failed to read rules file {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The rules document is not valid JSON for the expected schema.
    #[error("invalid rules document: {0}")]
    Json(#[from] serde_json::Error),

    /// A CSS selector failed to parse.
    #[error("retailer {retailer}: invalid selector {selector:?}: {message}")]
    InvalidSelector {
        /// Retailer key.
        retailer: String,
        /// Offending selector.
        selector: String,
        /// Parser message.
        message: String,
    },

    /// A product-ID path pattern failed to compile.
    #[error("retailer {retailer}: invalid id pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// Retailer key.
        retailer: String,
        /// Offending pattern.
        pattern: String,
        /// Regex compiler error.
        source: regex::Error,
    },

    /// A structural problem in the table (duplicate keys, empty lists, bad range).
    #[error("invalid rule table: {0}")]
    Invalid(String),
}

impl From<RulesError> for crate::error::TrackerError {
    fn from(err: RulesError) -> Self {
        Self::Config(err.to_string())
    }
}
