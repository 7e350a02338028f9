//! OpenTelemetry tracing and logging setup.
//!
//! Configures:
//! - Console logging with structured format (filtered by `RUST_LOG`)
//! - W3C Trace Context propagation
//! - OTLP/HTTP export of spans and log records, per the configured mode

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::logs::LoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{self as sdktrace, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{Config, OtlpTarget};
use crate::observability::logger::{init_logger, Logger};
use crate::observability::metrics::init_metrics_with_target;
use crate::observability::TelemetryError;

/// Instrumentation scope name for spans.
const TRACER_NAME: &str = "spyglass";

/// Build the resource describing this service.
pub fn build_resource(config: &Config) -> Resource {
    Resource::new(vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        KeyValue::new("deployment.environment", config.environment.clone()),
    ])
}

fn build_tracer_provider(
    target: &OtlpTarget,
    resource: Resource,
) -> Result<TracerProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::new_exporter()
        .http()
        .with_endpoint(target.endpoint.clone())
        .with_headers(target.headers.clone())
        .build_span_exporter()
        .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_config(sdktrace::Config::default().with_resource(resource))
        .build())
}

fn build_logger_provider(
    target: &OtlpTarget,
    resource: Resource,
) -> Result<LoggerProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::new_exporter()
        .http()
        .with_endpoint(target.endpoint.clone())
        .with_headers(target.headers.clone())
        .build_log_exporter()
        .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

    Ok(LoggerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(resource)
        .build())
}

/// Guard owning the SDK providers.
///
/// Dropping the guard (or calling [`TelemetryGuard::shutdown`]) flushes
/// pending spans, log records and metrics.
pub struct TelemetryGuard {
    tracer_provider: Option<TracerProvider>,
    logger_provider: Option<LoggerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl std::fmt::Debug for TelemetryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryGuard")
            .field("traces", &self.tracer_provider.is_some())
            .field("logs", &self.logger_provider.is_some())
            .field("metrics", &self.meter_provider.is_some())
            .finish()
    }
}

impl TelemetryGuard {
    /// Whether spans are exported.
    pub fn exports_traces(&self) -> bool {
        self.tracer_provider.is_some()
    }

    /// Whether log records are exported.
    pub fn exports_logs(&self) -> bool {
        self.logger_provider.is_some()
    }

    /// Flush and shut down every provider.
    pub fn shutdown(mut self) -> Result<(), TelemetryError> {
        self.shutdown_providers()
    }

    fn shutdown_providers(&mut self) -> Result<(), TelemetryError> {
        let mut failure = None;

        if let Some(provider) = self.tracer_provider.take() {
            if let Err(e) = provider.shutdown() {
                tracing::error!(error = %e, "Error shutting down tracer provider");
                failure = Some(TelemetryError::Shutdown(e.to_string()));
            }
        }
        if let Some(provider) = self.logger_provider.take() {
            if let Err(e) = provider.shutdown() {
                tracing::error!(error = %e, "Error shutting down logger provider");
                failure = Some(TelemetryError::Shutdown(e.to_string()));
            }
        }
        if let Some(provider) = self.meter_provider.take() {
            if let Err(e) = provider.shutdown() {
                tracing::error!(error = %e, "Error shutting down meter provider");
                failure = Some(TelemetryError::Shutdown(e.to_string()));
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        let _ = self.shutdown_providers();
    }
}

/// Initialize tracing, logging and metrics for the service.
///
/// This sets up:
/// - Console logging with structured format
/// - Environment-based filter (via RUST_LOG, else `config.log_level`)
/// - OTLP span and log export for each configured target
///
/// An exporter that cannot be built is skipped with a warning; startup
/// continues with the remaining signals.
pub fn init_telemetry(config: &Config) -> Result<TelemetryGuard, TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info,spyglass=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(filter);

    global::set_text_map_propagator(TraceContextPropagator::new());

    let resource = build_resource(config);
    let targets = config.export_targets();

    let mut warnings = Vec::new();

    let tracer_provider = match targets.traces.as_ref() {
        Some(target) => match build_tracer_provider(target, resource.clone()) {
            Ok(provider) => Some(provider),
            Err(e) => {
                warnings.push(format!("traces disabled: {e}"));
                None
            }
        },
        None => None,
    };

    let logger_provider = match targets.logs.as_ref() {
        Some(target) => match build_logger_provider(target, resource.clone()) {
            Ok(provider) => Some(provider),
            Err(e) => {
                warnings.push(format!("logs disabled: {e}"));
                None
            }
        },
        None => None,
    };

    let otel_layer = tracer_provider.as_ref().map(|provider| {
        let tracer = provider
            .tracer_builder(TRACER_NAME)
            .with_version(env!("CARGO_PKG_VERSION"))
            .build();
        tracing_opentelemetry::layer()
            .with_tracer(tracer)
            .with_filter(LevelFilter::DEBUG)
    });

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    for warning in &warnings {
        tracing::warn!("{warning}");
    }

    if let Some(provider) = &tracer_provider {
        global::set_tracer_provider(provider.clone());
    }

    let logger = match &logger_provider {
        Some(provider) => Logger::with_provider(provider, config.service_name.clone()),
        None => Logger::console(config.service_name.clone()),
    };
    init_logger(logger);

    let meter_provider = init_metrics_with_target(targets.metrics.as_ref(), resource);

    tracing::info!(
        mode = %config.otel_mode,
        traces_endpoint = targets.traces.as_ref().map_or("-", |t| t.endpoint.as_str()),
        logs_endpoint = targets.logs.as_ref().map_or("-", |t| t.endpoint.as_str()),
        service = %config.service_name,
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        "OpenTelemetry instrumentation initialized"
    );

    Ok(TelemetryGuard {
        tracer_provider,
        logger_provider,
        meter_provider,
    })
}

/// Initialize tracing for tests (only logs errors).
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}
