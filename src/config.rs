//! Configuration parsing for the Spyglass API server.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides (a `.env` file is loaded by the binary)
//! - Per-signal OTLP export targets for direct and collector modes

use clap::{Parser, ValueEnum};
use std::collections::HashMap;
use std::time::Duration;

use crate::cache::CacheConfig;

/// Where telemetry is shipped.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtelMode {
    /// Export straight to the configured OTLP endpoints.
    Direct,
    /// Export to a local OpenTelemetry collector.
    Collector,
}

impl std::fmt::Display for OtelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Collector => f.write_str("collector"),
        }
    }
}

/// Spyglass: an OpenTelemetry-instrumented API with a traced in-memory cache.
#[derive(Parser, Debug, Clone)]
#[command(name = "spyglass")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "SPYGLASS_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "SPYGLASS_PORT", default_value_t = 3001)]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Service name reported in telemetry
    #[arg(long, env = "OTEL_SERVICE_NAME", default_value = "spyglass-api")]
    pub service_name: String,

    /// Deployment environment reported in telemetry
    #[arg(long, env = "DEPLOYMENT_ENVIRONMENT", default_value = "development")]
    pub environment: String,

    /// Telemetry export mode
    #[arg(long, env = "OTEL_MODE", value_enum, default_value_t = OtelMode::Direct)]
    pub otel_mode: OtelMode,

    /// Base URL of the local collector (collector mode)
    #[arg(long, env = "OTEL_COLLECTOR_ENDPOINT", default_value = "http://localhost:4318")]
    pub collector_endpoint: String,

    /// OTLP/HTTP traces endpoint (direct mode)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_TRACES_ENDPOINT")]
    pub traces_endpoint: Option<String>,

    /// Headers for the traces endpoint, as `key1=value1,key2=value2`
    #[arg(long, env = "OTEL_EXPORTER_OTLP_TRACES_HEADERS")]
    pub traces_headers: Option<String>,

    /// OTLP/HTTP logs endpoint (direct mode)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_LOGS_ENDPOINT")]
    pub logs_endpoint: Option<String>,

    /// Headers for the logs endpoint, as `key1=value1,key2=value2`
    #[arg(long, env = "OTEL_EXPORTER_OTLP_LOGS_HEADERS")]
    pub logs_headers: Option<String>,

    /// OTLP/HTTP metrics endpoint (direct mode)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_METRICS_ENDPOINT")]
    pub metrics_endpoint: Option<String>,

    /// Headers for the metrics endpoint, as `key1=value1,key2=value2`
    #[arg(long, env = "OTEL_EXPORTER_OTLP_METRICS_HEADERS")]
    pub metrics_headers: Option<String>,

    /// Default cache entry TTL in seconds
    #[arg(long, env = "SPYGLASS_CACHE_TTL_SECS", default_value_t = 300)]
    pub cache_ttl_secs: u64,

    /// Interval between expired-entry sweeps in seconds
    #[arg(long, env = "SPYGLASS_CACHE_SWEEP_SECS", default_value_t = 60)]
    pub cache_sweep_secs: u64,
}

/// A single OTLP/HTTP destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtlpTarget {
    pub endpoint: String,
    pub headers: HashMap<String, String>,
}

/// Resolved export destinations, one per signal. `None` disables export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportTargets {
    pub traces: Option<OtlpTarget>,
    pub logs: Option<OtlpTarget>,
    pub metrics: Option<OtlpTarget>,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Resolve where each signal is exported for the configured mode.
    pub fn export_targets(&self) -> ExportTargets {
        match self.otel_mode {
            OtelMode::Collector => {
                let base = self.collector_endpoint.trim_end_matches('/');
                let target = |path: &str| {
                    Some(OtlpTarget {
                        endpoint: format!("{base}{path}"),
                        headers: HashMap::new(),
                    })
                };
                ExportTargets {
                    traces: target("/v1/traces"),
                    logs: target("/v1/logs"),
                    metrics: target("/v1/metrics"),
                }
            }
            OtelMode::Direct => {
                let target = |endpoint: &Option<String>, headers: &Option<String>| {
                    endpoint.as_ref().map(|endpoint| OtlpTarget {
                        endpoint: endpoint.clone(),
                        headers: parse_headers(headers.as_deref()),
                    })
                };
                ExportTargets {
                    traces: target(&self.traces_endpoint, &self.traces_headers),
                    logs: target(&self.logs_endpoint, &self.logs_headers),
                    metrics: target(&self.metrics_endpoint, &self.metrics_headers),
                }
            }
        }
    }

    /// Cache settings derived from the CLI/environment.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            default_ttl: Duration::from_secs(self.cache_ttl_secs),
            sweep_interval: Duration::from_secs(self.cache_sweep_secs),
        }
    }

    /// Create a default configuration for testing.
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0, // Random port
            log_level: "debug".into(),
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3001,
            log_level: "info".into(),
            service_name: "spyglass-api".into(),
            environment: "development".into(),
            otel_mode: OtelMode::Direct,
            collector_endpoint: "http://localhost:4318".into(),
            traces_endpoint: None,
            traces_headers: None,
            logs_endpoint: None,
            logs_headers: None,
            metrics_endpoint: None,
            metrics_headers: None,
            cache_ttl_secs: 300,
            cache_sweep_secs: 60,
        }
    }
}

/// Parse an OTLP header string of the form `key1=value1,key2=value2`.
///
/// Values keep any further `=` characters. Pairs without a key or without
/// an `=` are skipped.
pub fn parse_headers(raw: Option<&str>) -> HashMap<String, String> {
    let Some(raw) = raw else {
        return HashMap::new();
    };

    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}
