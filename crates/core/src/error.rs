//! Typed errors for the extraction engine.

use thiserror::Error;

/// Transport-level failure talking to the portal. Always surfaced to the
/// caller of a search or detail request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("HTTP error: {0}")]
    Status(u16),

    #[error("unreadable response body: {0}")]
    Decode(String),
}

/// Failure while expanding a structured response schema.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    /// A definition refers back to itself through the chain being expanded.
    #[error("reference cycle through definition `{0}`")]
    ReferenceCycle(String),

    /// Nesting went deeper than the flattener allows.
    #[error("schema nesting exceeds {0} levels")]
    DepthExceeded(usize),

    /// Expansion produced more fields than the flattener allows.
    #[error("schema expands to more than {0} fields")]
    TooManyFields(usize),
}

/// Invalid configuration value.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a number, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} is not a valid URL: {value:?}")]
    InvalidUrl { key: &'static str, value: String },
}
