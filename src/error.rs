//! Tracker error types with HTTP status code mapping.
//!
//! [`TrackerError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! Lower layers keep their own narrow error enums ([`crate::fetch::FetchError`],
//! [`crate::extract::RulesError`], [`crate::notify::ChannelError`]) and are
//! translated at the nearest boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::fetch::FetchError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1002,
///     "message": "unsupported retailer: example.com",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`TrackerError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                      |
/// |-----------|-------------------|----------------------------------|
/// | 1000–1999 | Validation        | 400 / 422                        |
/// | 2000–2999 | State / Not Found | 404 Not Found / 409 Conflict     |
/// | 3000–3999 | Server / Upstream | 500 / 502 / 504                  |
/// | 4000–4999 | Extraction        | 422 Unprocessable Entity         |
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The link does not belong to any retailer in the rule table.
    #[error("unsupported retailer: {0}")]
    UnsupportedRetailer(String),

    /// No product-ID pattern of the retailer matched the URL.
    #[error("could not extract a product id from {0}")]
    IdentityNotFound(String),

    /// No user with the given external identity exists.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// No product with the given canonical ID exists.
    #[error("product not found: {0}")]
    ProductNotFound(String),

    /// A sweep is already running.
    #[error("a sweep is already in progress")]
    SweepInProgress,

    /// The page was fetched but no price could be found on it.
    #[error("price unavailable for {0}")]
    PriceUnavailable(String),

    /// Fetching the page exceeded its timeout.
    #[error("fetching {url} timed out after {timeout_ms} ms")]
    FetchTimeout {
        /// The URL being fetched.
        url: String,
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// Fetching or rendering the page failed.
    #[error("failed to fetch page: {0}")]
    FetchFailed(String),

    /// Tracking store failure; the transaction was rolled back.
    #[error("store error: {0}")]
    StoreError(String),

    /// Client exceeded rate limit.
    #[error("rate limit exceeded; retry after {retry_after_ms} ms")]
    RateLimited {
        /// Milliseconds until the client may retry.
        retry_after_ms: u64,
    },

    /// Invalid configuration (rule table, environment).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TrackerError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::UnsupportedRetailer(_) => 1002,
            Self::IdentityNotFound(_) => 1003,
            Self::UserNotFound(_) => 2001,
            Self::ProductNotFound(_) => 2002,
            Self::SweepInProgress => 2003,
            Self::PriceUnavailable(_) => 4001,
            Self::StoreError(_) => 3001,
            Self::FetchTimeout { .. } => 3002,
            Self::FetchFailed(_) => 3003,
            Self::Config(_) => 3004,
            Self::RateLimited { .. } => 429,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedRetailer(_)
            | Self::IdentityNotFound(_)
            | Self::PriceUnavailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::UserNotFound(_) | Self::ProductNotFound(_) => StatusCode::NOT_FOUND,
            Self::SweepInProgress => StatusCode::CONFLICT,
            Self::FetchTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::FetchFailed(_) => StatusCode::BAD_GATEWAY,
            Self::StoreError(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl From<FetchError> for TrackerError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout { url, timeout } => Self::FetchTimeout {
                url,
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
            other => Self::FetchFailed(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for TrackerError {
    fn from(err: sqlx::Error) -> Self {
        Self::StoreError(err.to_string())
    }
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
