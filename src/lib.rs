//! belfry - real-time notifications for the church-management suite
//!
//! This is the convenience crate that re-exports the belfry sub-crates.
//! Use it when you want a single dependency covering the whole real-time
//! layer.
//!
//! # Architecture
//!
//! belfry is organized into modular crates:
//!
//! - **belfry-core**: wire frames and codec, shared data model, errors,
//!   observability bootstrap
//! - **belfry-client**: WebSocket connection manager with reconnection,
//!   handler registry, REST client, unread-count aggregator
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use belfry::{ApiClient, ConnectionBuilder, NotificationAggregator};
//! use belfry::core::UserContext;
//!
//! #[tokio::main]
//! async fn main() -> belfry_core::Result<()> {
//!     let connection =
//!         ConnectionBuilder::new("wss://gateway.example.org", "https://api.example.org").build();
//!     let aggregator = NotificationAggregator::new(
//!         connection,
//!         ApiClient::new("https://api.example.org"),
//!     );
//!
//!     aggregator
//!         .initialize(UserContext::new("person-1", "church-1"))
//!         .await?;
//!
//!     let _unsubscribe = aggregator.subscribe(|counts| {
//!         println!("unread: {:?}", counts);
//!     });
//!
//!     Ok(())
//! }
//! ```

// Re-export the sub-crates under stable module names so users can reach
// everything through the `belfry::` prefix.
pub use belfry_client as client;
pub use belfry_core as core;

// Convenience re-exports of the most commonly used types
pub use belfry_client::{
    ApiClient, ConnectionBuilder, ConnectionState, NotificationAggregator, SocketClient,
};
pub use belfry_core::{NotificationCounts, SocketFrame, UserContext};
