//! OpenTelemetry observability configuration and initialization
//!
//! Sets up the telemetry pipeline used by the belfry crates: distributed
//! tracing, metrics, and structured logging, exported to an OTLP collector.
//! The client records connection-state and dispatch metrics through the
//! meter provider registered here; all log output goes through `tracing`.
//!
//! Initialization happens once at host-application startup, before the
//! connection is built:
//!
//! ```rust,no_run
//! use belfry_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("belfry-web")
//!         .with_endpoint("http://localhost:4317")
//!         .with_log_level("debug");
//!
//!     belfry_core::init_observability(config).expect("Failed to init observability");
//!
//!     // ... run the application ...
//!
//!     belfry_core::shutdown_observability();
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector endpoint
//! - `RUST_LOG`: log level filter (e.g. "info", "belfry_client=debug")

use opentelemetry::{global, KeyValue};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Observability configuration
///
/// Each telemetry pillar (traces, metrics, logs) can be toggled
/// independently. Defaults work against a local collector on the standard
/// OTLP gRPC port.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name attached to all exported telemetry
    pub service_name: String,
    /// Service version, useful for correlating telemetry with deployments
    pub service_version: String,
    /// OTLP collector endpoint (gRPC)
    pub otlp_endpoint: String,
    /// Enable distributed tracing
    pub enable_traces: bool,
    /// Enable metrics collection
    pub enable_metrics: bool,
    /// Enable structured log export
    pub enable_logs: bool,
    /// Log level filter used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "belfry".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            enable_traces: true,
            enable_metrics: true,
            enable_logs: true,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl ObservabilityConfig {
    /// Create a configuration with a custom service name; everything else
    /// uses defaults.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the OTLP collector endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    /// Set the log level filter.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the service version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Enable or disable distributed tracing.
    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    /// Enable or disable metrics collection.
    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    /// Enable or disable structured log export.
    pub fn with_logs(mut self, enable: bool) -> Self {
        self.enable_logs = enable;
        self
    }
}

/// Initialize OpenTelemetry with the given configuration
///
/// Call once at application startup, before building the connection.
/// Calling it a second time panics, since the global providers can only be
/// installed once.
///
/// # Errors
///
/// Fails when a provider cannot be set up, e.g. when the collector
/// endpoint is malformed.
pub fn init_observability(
    config: ObservabilityConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // The tracer is needed before the provider goes global, because the
    // tracing subscriber wants it for its telemetry layer.
    let tracer = if config.enable_traces {
        Some(init_tracer(&config)?)
    } else {
        None
    };

    if config.enable_metrics {
        init_metrics(&config)?;
    }

    init_tracing_subscriber(&config, tracer)?;

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        logs = config.enable_logs,
        "OpenTelemetry initialized"
    );

    Ok(())
}

/// Set up the tracer provider and return a tracer for the subscriber layer.
///
/// Spans are batch-exported over OTLP/gRPC. Sampling is AlwaysOn; adjust
/// for high-traffic deployments.
fn init_tracer(
    config: &ObservabilityConfig,
) -> Result<opentelemetry_sdk::trace::Tracer, Box<dyn std::error::Error + Send + Sync>> {
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};
    use opentelemetry_sdk::Resource;

    let resource = Resource::builder_empty()
        .with_attributes(vec![
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                config.service_name.clone(),
            ),
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                config.service_version.clone(),
            ),
        ])
        .build();

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()?;

    let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build();

    use opentelemetry::trace::TracerProvider as _;
    let tracer = provider.tracer(config.service_name.clone());

    global::set_tracer_provider(provider);

    Ok(tracer)
}

/// Set up the meter provider. Metrics are aggregated and exported every
/// 30 seconds.
fn init_metrics(
    config: &ObservabilityConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use opentelemetry_sdk::Resource;

    let resource = Resource::builder_empty()
        .with_attributes(vec![
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                config.service_name.clone(),
            ),
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                config.service_version.clone(),
            ),
        ])
        .build();

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .build()?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(Duration::from_secs(30))
        .build();

    let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(resource)
        .build();

    global::set_meter_provider(provider);
    Ok(())
}

/// Bridge Rust's `tracing` ecosystem to OpenTelemetry.
///
/// Layers: the OpenTelemetry span layer (when traces are enabled), an
/// `EnvFilter` built from `RUST_LOG` or the configured level, and a JSON
/// fmt layer for local structured output.
fn init_tracing_subscriber(
    config: &ObservabilityConfig,
    tracer: Option<opentelemetry_sdk::trace::Tracer>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    if let Some(tracer) = tracer {
        let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .json();

        tracing_subscriber::registry()
            .with(telemetry_layer)
            .with(env_filter)
            .with(fmt_layer)
            .init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .json();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }

    Ok(())
}

/// Gracefully shut down the OpenTelemetry providers.
///
/// Providers flush on drop in SDK 0.30+, so this is mostly an explicit
/// lifecycle marker; call it from the host application's shutdown path.
pub fn shutdown_observability() {
    tracing::info!("Shutting down OpenTelemetry");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.service_name, "belfry");
        assert!(config.enable_traces);
        assert!(config.enable_metrics);
        assert!(config.enable_logs);
    }

    #[test]
    fn test_custom_config() {
        let config = ObservabilityConfig::new("belfry-test")
            .with_endpoint("http://custom:4317")
            .with_log_level("debug")
            .with_version("1.0.0")
            .with_traces(false);

        assert_eq!(config.service_name, "belfry-test");
        assert_eq!(config.otlp_endpoint, "http://custom:4317");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.service_version, "1.0.0");
        assert!(!config.enable_traces);
    }

    #[test]
    fn test_config_builder_chaining() {
        let config = ObservabilityConfig::default()
            .with_endpoint("http://test:4317")
            .with_log_level("info")
            .with_metrics(false)
            .with_logs(false);

        assert_eq!(config.otlp_endpoint, "http://test:4317");
        assert!(!config.enable_metrics);
        assert!(!config.enable_logs);
    }

    #[test]
    fn test_shutdown_idempotent() {
        shutdown_observability();
        shutdown_observability();
    }
}
