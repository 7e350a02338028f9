//! OpenTelemetry metrics for cache activity.
//!
//! Key metrics:
//! - spyglass_cache_operations_total: Counter of cache operations by outcome
//! - spyglass_cache_entries: Gauge of entries held after each write or sweep

use opentelemetry::metrics::{Counter, Gauge, Meter};
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::{ManualReader, SdkMeterProvider};
use opentelemetry_sdk::Resource;
use std::sync::OnceLock;

use crate::config::OtlpTarget;

/// Global metrics instance.
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Spyglass metrics registry.
#[derive(Debug)]
pub struct Metrics {
    /// Cache operations, labelled by `operation` and `result`.
    pub cache_operations: Counter<u64>,
    /// Number of entries currently held.
    pub cache_entries: Gauge<u64>,
}

impl Metrics {
    /// Create a new metrics registry from a meter.
    fn new(meter: &Meter) -> Self {
        Self {
            cache_operations: meter
                .u64_counter("spyglass_cache_operations_total")
                .with_description("Total number of cache operations")
                .with_unit("1")
                .init(),
            cache_entries: meter
                .u64_gauge("spyglass_cache_entries")
                .with_description("Entries currently held by the cache")
                .with_unit("1")
                .init(),
        }
    }

    pub fn cache_operation(&self, operation: &'static str, result: &'static str) {
        let attrs = [
            KeyValue::new("operation", operation),
            KeyValue::new("result", result),
        ];
        self.cache_operations.add(1, &attrs);
    }

    pub fn cache_entries(&self, entries: usize) {
        self.cache_entries
            .record(u64::try_from(entries).unwrap_or(u64::MAX), &[]);
    }
}

/// Provider that records into a reader nobody exports from.
pub(crate) fn manual_provider(resource: Resource) -> SdkMeterProvider {
    let reader = ManualReader::builder().build();
    SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(resource)
        .build()
}

fn build_meter_provider(target: Option<&OtlpTarget>, resource: Resource) -> SdkMeterProvider {
    let Some(target) = target else {
        return manual_provider(resource);
    };

    use opentelemetry_otlp::{Protocol, WithExportConfig};

    let exporter = opentelemetry_otlp::new_exporter()
        .http()
        .with_endpoint(target.endpoint.clone())
        .with_headers(target.headers.clone())
        .with_protocol(Protocol::HttpBinary);

    match opentelemetry_otlp::new_pipeline()
        .metrics(opentelemetry_sdk::runtime::Tokio)
        .with_exporter(exporter)
        .with_resource(resource.clone())
        .with_period(std::time::Duration::from_secs(10))
        .build()
    {
        Ok(provider) => {
            tracing::info!(endpoint = %target.endpoint, "OTLP metrics exporter configured");
            provider
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create OTLP metrics exporter, metrics stay local");
            manual_provider(resource)
        }
    }
}

/// Initialize the metrics system.
///
/// This should be called once at startup. Subsequent calls are ignored and
/// return `None`. Without a target, metrics are recorded but never exported.
///
/// The returned provider must be shut down on exit so the last
/// measurements are exported.
pub fn init_metrics_with_target(
    target: Option<&OtlpTarget>,
    resource: Resource,
) -> Option<SdkMeterProvider> {
    let mut installed = None;
    METRICS.get_or_init(|| {
        let provider = build_meter_provider(target, resource);
        global::set_meter_provider(provider.clone());
        installed = Some(provider);

        let meter = global::meter("spyglass");
        Metrics::new(&meter)
    });
    installed
}

/// Initialize the metrics system without OTLP export.
pub fn init_metrics() {
    init_metrics_with_target(None, Resource::empty());
}

/// Record one cache operation and its outcome (`hit`, `miss`, `stored`, ...).
pub fn record_cache_operation(operation: &'static str, result: &'static str) {
    if let Some(m) = METRICS.get() {
        m.cache_operation(operation, result);
    }
}

/// Record the current number of cache entries.
pub fn record_cache_entries(entries: usize) {
    if let Some(m) = METRICS.get() {
        m.cache_entries(entries);
    }
}
