//! Builder for configuring a connection before use
//!
//! The builder collects the gateway endpoint, the messaging API base URL,
//! the reconnect policy and optional metrics, and produces an unconnected
//! [`SocketClient`]. The connection is opened by the first `init()` call,
//! and the same client can be re-initialized later (page navigation, token
//! refresh) without rebuilding.
//!
//! # Examples
//!
//! ```rust,no_run
//! use belfry_client::{ConnectionBuilder, ExponentialBackoff};
//! use std::time::Duration;
//!
//! # async fn example() -> belfry_core::Result<()> {
//! let client = ConnectionBuilder::new("wss://gateway.example.org", "https://api.example.org")
//!     .with_reconnect(Box::new(
//!         ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30))
//!             .with_max_attempts(10),
//!     ))
//!     .build();
//!
//! client.init().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::api::ApiClient;
use crate::backoff::{ExponentialBackoff, NoReconnect, ReconnectPolicy};
use crate::connection::SocketClient;
use crate::metrics::ClientMetrics;

/// Builder for a [`SocketClient`]
pub struct ConnectionBuilder {
    socket_url: String,
    api_url: String,
    policy: Box<dyn ReconnectPolicy>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl ConnectionBuilder {
    /// Create a builder for the given gateway and messaging API endpoints.
    ///
    /// The default reconnect policy is [`ExponentialBackoff::default`]:
    /// one second doubling to thirty, ten attempts.
    pub fn new(socket_url: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            socket_url: socket_url.into(),
            api_url: api_url.into(),
            policy: Box::new(ExponentialBackoff::default()),
            metrics: None,
        }
    }

    /// Use a custom reconnect policy.
    pub fn with_reconnect(mut self, policy: Box<dyn ReconnectPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Disable automatic reconnection.
    pub fn without_reconnect(mut self) -> Self {
        self.policy = Box::new(NoReconnect);
        self
    }

    /// Attach a metrics handle. Connection-state transitions, frames and
    /// reconnect activity are recorded through it.
    pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the client. No connection is opened until `init()`.
    pub fn build(self) -> SocketClient {
        SocketClient::from_parts(
            self.socket_url,
            ApiClient::new(self.api_url),
            self.policy,
            self.metrics,
        )
    }
}
