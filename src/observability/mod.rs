//! OpenTelemetry observability infrastructure.
//!
//! Provides:
//! - Instrumentation bootstrap with OTLP export of spans and logs
//! - Server spans for incoming HTTP requests
//! - Span helpers for manual instrumentation
//! - A severity-leveled logger over the Logs API
//! - OTLP metrics for cache activity

pub mod http;
pub mod logger;
pub mod metrics;
pub mod span;
pub mod tracing;

#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;

/// Errors raised while setting up or tearing down telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to install the tracing subscriber.
    #[error("Failed to initialize tracing: {0}")]
    Init(String),

    /// Failed to build an OTLP exporter.
    #[error("Failed to create OTLP exporter: {0}")]
    Exporter(String),

    /// A provider reported an error while flushing or shutting down.
    #[error("Failed to shut down telemetry: {0}")]
    Shutdown(String),
}
