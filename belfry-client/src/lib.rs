//! Real-time notification client for the belfry platform
//!
//! This crate owns the client side of the platform's real-time channel:
//! a single WebSocket connection to the messaging gateway with automatic
//! reconnection, an action-keyed handler registry, and an unread-count
//! aggregator that feeds the application shell's badges.
//!
//! # Core Features
//!
//! - **Connection management**: one live socket, explicit init/cleanup
//!   lifecycle, epoch-guarded re-initialization
//! - **Auto-Reconnection**: exponential backoff with a configurable policy
//!   and a synthesized `reconnect` event on recovery
//! - **Pub/Sub dispatch**: multiple subscribers per action, idempotent
//!   registration, per-handler panic isolation
//! - **Unread counts**: debounced REST recounts with change-gated publish
//! - **Observability**: tracing throughout, OpenTelemetry metrics opt-in
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use belfry_client::{ApiClient, ConnectionBuilder, NotificationAggregator};
//! use belfry_core::UserContext;
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
//!     let unsubscribe = aggregator.subscribe(|counts| {
//!         println!("{} notifications, {} conversations", counts.notification_count, counts.pm_count);
//!     });
//!
//!     aggregator
//!         .initialize(UserContext::new("person-1", "church-1"))
//!         .await?;
//!
//!     // ... run the application ...
//!
//!     unsubscribe();
//!     aggregator.cleanup();
//!     aggregator.connection().cleanup().await;
//!     Ok(())
//! }
//! ```

mod aggregator;
mod api;
mod backoff;
mod builder;
mod connection;
mod metrics;
mod registry;

pub use aggregator::{unread_conversation_count, CountsListener, NotificationAggregator};
pub use api::ApiClient;
pub use backoff::{ExponentialBackoff, FixedDelay, NoReconnect, ReconnectPolicy};
pub use builder::ConnectionBuilder;
pub use connection::{ConnectionState, SocketClient};
pub use metrics::ClientMetrics;
pub use registry::{ActionRegistry, HandlerFn};
