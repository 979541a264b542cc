//! Error types for belfry
//!
//! All belfry crates share one application-level `Error` enum (built with
//! `thiserror`) and the `Result<T>` alias below. The taxonomy mirrors the
//! layers a notification client crosses:
//!
//! - **Transport**: `WebSocket`, `ConnectionClosed`
//! - **REST**: `Http`
//! - **Decoding**: `Serialization`, `InvalidFrame`
//! - **Operational**: `Timeout`, `Internal`
//!
//! Only the top-level connect paths (`SocketClient::init`,
//! `NotificationAggregator::initialize`) surface these to callers. Errors
//! that occur inside asynchronous event dispatch have no caller to report to
//! and are logged and recovered locally instead.

use thiserror::Error;

/// Result type for belfry operations
///
/// Convenience alias used throughout the belfry crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-level error type for belfry operations
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// WebSocket transport layer error
    ///
    /// Covers dial failures, protocol violations and frame-level errors
    /// below the belfry wire protocol.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// HTTP error from a REST endpoint
    ///
    /// Raised by the API client for connection failures, non-success status
    /// codes and response-body decode failures.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Serialization or deserialization error
    ///
    /// A value could not be converted to or from JSON. Usually indicates a
    /// mismatch between the gateway's payload shape and the expected type.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Inbound frame is not a well-formed action frame
    ///
    /// The text was valid JSON but did not carry the `{action, data}` shape.
    /// Frames that fail this way are dropped at the dispatch boundary.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Connection is no longer active
    ///
    /// Operations that need a live socket fail with this until the next
    /// successful `init()`.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation timeout
    #[error("Operation timed out")]
    Timeout,

    /// Unexpected internal error
    ///
    /// Used sparingly for conditions that should not occur in practice.
    #[error("Internal error: {0}")]
    Internal(String),
}
