//! Error types shared across the client.

use thiserror::Error;

/// Failure of a single transport call against the catalog service.
///
/// Listing failures surface as a visible error state; mutation failures are
/// isolated to their task. Neither is ever retried automatically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Could not reach the catalog service at all.
    #[error("network error: {0}")]
    Network(String),

    /// The catalog answered with a non-success status.
    #[error("catalog returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body did not parse as the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),

    /// The call was cancelled before completion.
    #[error("request cancelled")]
    Cancelled,
}

/// Locally detected input problem. Never sent over the wire; blocks
/// submission instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("tags may not be empty strings")]
    EmptyTag,
}
