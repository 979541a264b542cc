//! Client metrics definitions
//!
//! OpenTelemetry instruments for monitoring connection health and
//! notification throughput. Recorded automatically when a metrics handle
//! is passed to the builder; exported through the meter provider
//! registered by `belfry_core::init_observability`.
//!
//! # Metrics Collected
//!
//! - **connection_state**: current connection lifecycle state (gauge)
//! - **frames_received**: inbound frames, labelled by action (counter)
//! - **dispatch_errors**: dropped frames and handler panics (counter)
//! - **reconnection_attempts / reconnection_success**: reconnect activity
//! - **recounts_total**: unread-count recomputations (counter)
//! - **publishes_total**: count changes delivered to subscribers (counter)

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Meter},
    KeyValue,
};

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// Connection state (0=uninitialized, 1=connecting, 2=open, 3=closing, 4=closed)
    pub connection_state: Gauge<i64>,
    /// Total inbound frames, labelled by action
    pub frames_received: Counter<u64>,
    /// Total dispatch failures (undecodable frames, handler panics)
    pub dispatch_errors: Counter<u64>,
    /// Total reconnection attempts
    pub reconnection_attempts: Counter<u64>,
    /// Total successful reconnections
    pub reconnection_success: Counter<u64>,
    /// Total unread-count recomputations
    pub recounts_total: Counter<u64>,
    /// Total count publishes to subscribers
    pub publishes_total: Counter<u64>,
}

impl ClientMetrics {
    /// Create a new metrics handle under the given service name.
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Create a metrics handle against a custom meter.
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("belfry.client.connection.state")
                .with_description("Connection state (0=uninitialized, 1=connecting, 2=open, 3=closing, 4=closed)")
                .build(),
            frames_received: meter
                .u64_counter("belfry.client.frames.received")
                .with_description("Total number of inbound frames")
                .build(),
            dispatch_errors: meter
                .u64_counter("belfry.client.dispatch.errors")
                .with_description("Total number of dispatch failures")
                .build(),
            reconnection_attempts: meter
                .u64_counter("belfry.client.reconnection.attempts")
                .with_description("Total number of reconnection attempts")
                .build(),
            reconnection_success: meter
                .u64_counter("belfry.client.reconnection.success")
                .with_description("Total number of successful reconnections")
                .build(),
            recounts_total: meter
                .u64_counter("belfry.client.recounts.total")
                .with_description("Total number of unread-count recomputations")
                .build(),
            publishes_total: meter
                .u64_counter("belfry.client.publishes.total")
                .with_description("Total number of count publishes to subscribers")
                .build(),
        }
    }

    /// Update the connection-state gauge.
    pub fn update_connection_state(&self, state: i64) {
        self.connection_state.record(state, &[]);
    }

    /// Record an inbound frame.
    pub fn record_frame(&self, action: &str) {
        let attributes = &[KeyValue::new("action", action.to_string())];
        self.frames_received.add(1, attributes);
    }

    /// Record a dispatch failure.
    pub fn record_dispatch_error(&self, kind: &str) {
        let attributes = &[KeyValue::new("kind", kind.to_string())];
        self.dispatch_errors.add(1, attributes);
    }

    /// Record a reconnection attempt.
    pub fn record_reconnection_attempt(&self) {
        self.reconnection_attempts.add(1, &[]);
    }

    /// Record a successful reconnection.
    pub fn record_reconnection_success(&self) {
        self.reconnection_success.add(1, &[]);
    }

    /// Record a recount.
    pub fn record_recount(&self) {
        self.recounts_total.add(1, &[]);
    }

    /// Record a publish to subscribers.
    pub fn record_publish(&self) {
        self.publishes_total.add(1, &[]);
    }
}
