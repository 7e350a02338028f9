//! Severity-leveled logger over the OpenTelemetry Logs API.
//!
//! Records are emitted while the current `tracing` span's context is
//! attached, so the SDK stamps them with the trace and span ids. Never add
//! trace ids as attributes; backends would see them twice.
//!
//! Usage:
//!
//! ```ignore
//! use opentelemetry::KeyValue;
//! use spyglass::observability::logger::logger;
//!
//! logger().info("User logged in", vec![KeyValue::new("user.id", 123_i64)]);
//! logger().error("Payment failed", vec![KeyValue::new("order.id", 456_i64)]);
//! ```

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::sync::OnceLock;
use std::time::SystemTime;

use opentelemetry::logs::{AnyValue, LogRecord as _, Logger as _, LoggerProvider as _};
use opentelemetry::{KeyValue, Value};
use opentelemetry_sdk::logs::{Logger as SdkLogger, LoggerProvider};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Service name used by the fallback logger before [`init_logger`] runs.
const DEFAULT_SERVICE_NAME: &str = "spyglass-api";

/// Global logger instance.
static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Log severity, numbered per the OpenTelemetry log data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    /// OpenTelemetry severity number.
    pub const fn number(self) -> i32 {
        match self {
            Self::Trace => 1,
            Self::Debug => 5,
            Self::Info => 9,
            Self::Warn => 13,
            Self::Error => 17,
            Self::Fatal => 21,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

impl From<Severity> for opentelemetry::logs::Severity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Trace => Self::Trace,
            Severity::Debug => Self::Debug,
            Severity::Info => Self::Info,
            Severity::Warn => Self::Warn,
            Severity::Error => Self::Error,
            Severity::Fatal => Self::Fatal,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application logger.
///
/// Writes every record to the console through `tracing`, and to the OTLP
/// logs pipeline when one is configured.
pub struct Logger {
    service_name: String,
    otel: Option<SdkLogger>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("service_name", &self.service_name)
            .field("otlp", &self.otel.is_some())
            .finish()
    }
}

impl Logger {
    /// Logger that only writes to the console.
    pub fn console(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            otel: None,
        }
    }

    /// Logger backed by an SDK logger provider.
    pub fn with_provider(provider: &LoggerProvider, service_name: impl Into<String>) -> Self {
        let service_name = service_name.into();
        Self {
            otel: Some(provider.logger(service_name.clone())),
            service_name,
        }
    }

    /// Whether records are exported over OTLP.
    pub fn is_exporting(&self) -> bool {
        self.otel.is_some()
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn trace(&self, message: impl AsRef<str>, attributes: Vec<KeyValue>) {
        self.log(Severity::Trace, message.as_ref(), attributes);
    }

    pub fn debug(&self, message: impl AsRef<str>, attributes: Vec<KeyValue>) {
        self.log(Severity::Debug, message.as_ref(), attributes);
    }

    pub fn info(&self, message: impl AsRef<str>, attributes: Vec<KeyValue>) {
        self.log(Severity::Info, message.as_ref(), attributes);
    }

    pub fn warn(&self, message: impl AsRef<str>, attributes: Vec<KeyValue>) {
        self.log(Severity::Warn, message.as_ref(), attributes);
    }

    pub fn error(&self, message: impl AsRef<str>, attributes: Vec<KeyValue>) {
        self.log(Severity::Error, message.as_ref(), attributes);
    }

    pub fn fatal(&self, message: impl AsRef<str>, attributes: Vec<KeyValue>) {
        self.log(Severity::Fatal, message.as_ref(), attributes);
    }

    /// Log an error at ERROR severity with `exception.*` attributes.
    pub fn exception<E>(&self, error: &E, mut attributes: Vec<KeyValue>)
    where
        E: std::error::Error + ?Sized,
    {
        attributes.extend(exception_attributes(error, &Backtrace::capture()));
        self.log(Severity::Error, &error.to_string(), attributes);
    }

    /// Emit a record at the given severity.
    pub fn log(&self, severity: Severity, message: &str, attributes: Vec<KeyValue>) {
        write_console(severity, message, &attributes);

        let Some(logger) = &self.otel else {
            return;
        };

        let now = SystemTime::now();
        let mut record = logger.create_log_record();
        record.set_timestamp(now);
        record.set_observed_timestamp(now);
        record.set_severity_number(severity.into());
        record.set_severity_text(severity.as_str());
        record.set_body(AnyValue::from(message.to_string()));
        for attribute in attributes {
            record.add_attribute(attribute.key, to_any_value(attribute.value));
        }
        record.add_attribute("service.name", self.service_name.clone());

        let _attached = tracing::Span::current().context().attach();
        logger.emit(record);
    }
}

/// Install the process-wide logger. Returns `false` if one was already set.
pub fn init_logger(logger: Logger) -> bool {
    let installed = LOGGER.set(logger).is_ok();
    if !installed {
        tracing::warn!("Logger already initialized, keeping the existing one");
    }
    installed
}

/// The process-wide logger; a console-only logger until [`init_logger`] runs.
pub fn logger() -> &'static Logger {
    LOGGER.get_or_init(|| Logger::console(DEFAULT_SERVICE_NAME))
}

/// `exception.*` attributes for an error.
pub fn exception_attributes<E>(error: &E, backtrace: &Backtrace) -> Vec<KeyValue>
where
    E: std::error::Error + ?Sized,
{
    let mut attributes = vec![
        KeyValue::new("exception.type", std::any::type_name::<E>()),
        KeyValue::new("exception.message", error.to_string()),
    ];
    if backtrace.status() == BacktraceStatus::Captured {
        attributes.push(KeyValue::new(
            "exception.stacktrace",
            backtrace.to_string(),
        ));
    }
    attributes
}

fn to_any_value(value: Value) -> AnyValue {
    match value {
        Value::Bool(b) => AnyValue::Boolean(b),
        Value::I64(i) => AnyValue::Int(i),
        Value::F64(f) => AnyValue::Double(f),
        Value::String(s) => AnyValue::String(s),
        other => AnyValue::from(other.to_string()),
    }
}

/// Renders attributes as `key=value` pairs for console output.
struct ConsoleAttributes<'a>(&'a [KeyValue]);

impl fmt::Display for ConsoleAttributes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, kv) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", kv.key, kv.value)?;
        }
        Ok(())
    }
}

fn write_console(severity: Severity, message: &str, attributes: &[KeyValue]) {
    let attrs = ConsoleAttributes(attributes);
    match severity {
        Severity::Trace => tracing::trace!(target: "spyglass::log", attributes = %attrs, "{message}"),
        Severity::Debug => tracing::debug!(target: "spyglass::log", attributes = %attrs, "{message}"),
        Severity::Info => tracing::info!(target: "spyglass::log", attributes = %attrs, "{message}"),
        Severity::Warn => tracing::warn!(target: "spyglass::log", attributes = %attrs, "{message}"),
        Severity::Error | Severity::Fatal => {
            tracing::error!(
                target: "spyglass::log",
                severity = severity.as_str(),
                attributes = %attrs,
                "{message}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::span::in_span;
    use crate::observability::testing::SpanCapture;
    use opentelemetry_sdk::logs::LogRecord as SdkLogRecord;
    use opentelemetry_sdk::testing::logs::InMemoryLogsExporter;

    #[derive(Debug, thiserror::Error)]
    #[error("connection refused")]
    struct ConnectError;

    #[test]
    fn test_severity_numbers() {
        assert_eq!(Severity::Trace.number(), 1);
        assert_eq!(Severity::Debug.number(), 5);
        assert_eq!(Severity::Info.number(), 9);
        assert_eq!(Severity::Warn.number(), 13);
        assert_eq!(Severity::Error.number(), 17);
        assert_eq!(Severity::Fatal.number(), 21);
        assert!(Severity::Warn < Severity::Error);
    }

    #[test]
    fn test_severity_maps_to_otel() {
        let otel: opentelemetry::logs::Severity = Severity::Warn.into();
        assert_eq!(otel as i32, Severity::Warn.number());
        assert_eq!(Severity::Fatal.to_string(), "FATAL");
    }

    #[test]
    fn test_exception_attributes_without_backtrace() {
        let attributes = exception_attributes(&ConnectError, &Backtrace::disabled());

        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[0].key.as_str(), "exception.type");
        assert!(attributes[0].value.as_str().ends_with("ConnectError"));
        assert_eq!(attributes[1].value.as_str(), "connection refused");
    }

    #[test]
    fn test_exception_attributes_with_backtrace() {
        let attributes = exception_attributes(&ConnectError, &Backtrace::force_capture());
        assert!(attributes
            .iter()
            .any(|kv| kv.key.as_str() == "exception.stacktrace"));
    }

    #[test]
    fn test_to_any_value() {
        assert_eq!(to_any_value(Value::Bool(true)), AnyValue::Boolean(true));
        assert_eq!(to_any_value(Value::I64(3)), AnyValue::Int(3));
        assert_eq!(
            to_any_value(Value::from("hit")),
            AnyValue::String("hit".into())
        );
    }

    #[test]
    fn test_console_attributes_format() {
        let attrs = [KeyValue::new("user.id", 7_i64), KeyValue::new("path", "/api")];
        assert_eq!(ConsoleAttributes(&attrs).to_string(), "user.id=7 path=/api");
    }

    #[test]
    fn test_console_logger_does_not_export() {
        let logger = Logger::console("test-service");
        assert!(!logger.is_exporting());
        logger.info("hello", vec![KeyValue::new("k", "v")]);
        logger.exception(&ConnectError, Vec::new());
    }

    #[test]
    fn test_global_logger_available_before_init() {
        assert!(!logger().service_name().is_empty());
    }

    fn exporting_logger(service_name: &str) -> (Logger, InMemoryLogsExporter, LoggerProvider) {
        let exporter = InMemoryLogsExporter::default();
        let provider = LoggerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (
            Logger::with_provider(&provider, service_name.to_string()),
            exporter,
            provider,
        )
    }

    fn attribute<'a>(record: &'a SdkLogRecord, key: &str) -> Option<&'a AnyValue> {
        record
            .attributes_iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    #[tokio::test]
    async fn test_exported_record_carries_span_context() {
        let capture = SpanCapture::install();
        let (logger, exporter, _provider) = exporting_logger("catalog");
        assert!(logger.is_exporting());

        in_span("restock", Vec::new(), |_span| async {
            logger.warn("Stock running low", vec![KeyValue::new("sku", "lamp-1")]);
        })
        .await;

        let logs = exporter.get_emitted_logs().unwrap();
        assert_eq!(logs.len(), 1);
        let record = &logs[0].record;

        assert_eq!(
            record.severity_number,
            Some(opentelemetry::logs::Severity::Warn)
        );
        assert_eq!(record.severity_text, Some("WARN"));
        assert_eq!(
            record.body,
            Some(AnyValue::String("Stock running low".into()))
        );
        assert_eq!(
            attribute(record, "service.name"),
            Some(&AnyValue::String("catalog".into()))
        );
        assert_eq!(
            attribute(record, "sku"),
            Some(&AnyValue::String("lamp-1".into()))
        );
        assert!(attribute(record, "trace_id").is_none());
        assert!(attribute(record, "span_id").is_none());

        let span = capture.single("restock");
        let trace_context = record.trace_context.as_ref().expect("trace context attached");
        assert_eq!(trace_context.trace_id, span.span_context.trace_id());
        assert_eq!(trace_context.span_id, span.span_context.span_id());
    }

    #[test]
    fn test_exported_record_outside_span_has_no_trace_context() {
        let (logger, exporter, _provider) = exporting_logger("catalog");

        logger.info("Started", Vec::new());

        let logs = exporter.get_emitted_logs().unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].record.trace_context.is_none());
        assert_eq!(
            logs[0].record.severity_number,
            Some(opentelemetry::logs::Severity::Info)
        );
    }

    #[test]
    fn test_exported_exception_record() {
        let (logger, exporter, _provider) = exporting_logger("catalog");

        logger.exception(&ConnectError, vec![KeyValue::new("db.system", "postgres")]);

        let logs = exporter.get_emitted_logs().unwrap();
        let record = &logs[0].record;
        assert_eq!(
            record.severity_number,
            Some(opentelemetry::logs::Severity::Error)
        );
        assert_eq!(
            record.body,
            Some(AnyValue::String("connection refused".into()))
        );
        assert_eq!(
            attribute(record, "exception.message"),
            Some(&AnyValue::String("connection refused".into()))
        );
        let exception_type = attribute(record, "exception.type").expect("exception.type");
        assert!(matches!(exception_type, AnyValue::String(s) if s.as_str().ends_with("ConnectError")));
        assert_eq!(
            attribute(record, "db.system"),
            Some(&AnyValue::String("postgres".into()))
        );
    }
}
