//! Core types and codec for belfry
//!
//! This crate provides the foundation the belfry notification client is
//! built on:
//!
//! - **Types**: action frames, identity binding, unread-count and
//!   private-message records
//! - **Codec**: encoding and decoding of `{action, data}` wire frames
//! - **Error handling**: the shared error taxonomy
//! - **Observability**: OpenTelemetry bootstrap for traces, metrics, logs
//!
//! The crate is transport-agnostic: it knows the wire shapes but not the
//! WebSocket or REST machinery, which lives in `belfry-client`.
//!
//! # Example
//!
//! ```rust
//! use belfry_core::{codec, SocketFrame, actions};
//! use serde_json::json;
//!
//! let frame = SocketFrame::new(actions::PRIVATE_MESSAGE, json!({"conversationId": "c1"}));
//! let text = codec::encode_frame(&frame).unwrap();
//! let decoded = codec::decode_frame(&text).unwrap();
//! assert_eq!(decoded.action, "privateMessage");
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;

pub use error::{Error, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{
    actions, ConnectionRegistration, MessageEvent, NotificationCounts, Organization, Person,
    PersonChurch, PrivateMessage, SocketFrame, UserContext, ALERTS_CONVERSATION, GET_ID,
};
