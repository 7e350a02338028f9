//! Span helpers for manual instrumentation.
//!
//! Spans are `tracing` spans; `tracing-opentelemetry` turns them into
//! OpenTelemetry spans. The `otel.*` fields carry the span name and status,
//! and `tracing` events recorded inside a span become span events.

use std::fmt::Display;
use std::future::Future;

use opentelemetry::KeyValue;
use tracing::field::Empty;
use tracing::{Instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// `tracing` name shared by helper spans; consoles show it with `otel.name`.
const HELPER_SPAN_NAME: &str = "unit_of_work";

/// Create a span named `name` with the given attributes.
fn new_span(name: &str, attributes: Vec<KeyValue>) -> Span {
    let span = tracing::info_span!(
        HELPER_SPAN_NAME,
        otel.name = name,
        otel.status_code = Empty,
        otel.status_message = Empty,
    );
    for attribute in attributes {
        span.set_attribute(attribute.key, attribute.value);
    }
    span
}

/// Run a fallible unit of work inside a span.
///
/// On `Ok` the span status is set to OK. On `Err` the status is set to
/// ERROR with the error message, an `exception` event is recorded, and the
/// error is returned unchanged. The span ends when the returned future
/// completes or is dropped.
pub async fn with_span<F, Fut, T, E>(name: &str, attributes: Vec<KeyValue>, f: F) -> Result<T, E>
where
    F: FnOnce(Span) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let span = new_span(name, attributes);
    let result = f(span.clone()).instrument(span.clone()).await;

    match &result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(error) => {
            let message = error.to_string();
            span.in_scope(|| {
                tracing::error!(
                    "exception.type" = std::any::type_name::<E>(),
                    "exception.message" = %message,
                    "exception"
                );
            });
            span.record("otel.status_code", "ERROR");
            span.record("otel.status_message", message.as_str());
        }
    }

    result
}

/// Run an infallible unit of work inside a span with status OK.
pub async fn in_span<F, Fut, T>(name: &str, attributes: Vec<KeyValue>, f: F) -> T
where
    F: FnOnce(Span) -> Fut,
    Fut: Future<Output = T>,
{
    let span = new_span(name, attributes);
    let output = f(span.clone()).instrument(span.clone()).await;
    span.record("otel.status_code", "OK");
    output
}

/// Set attributes on the current span. Does nothing outside a span.
pub fn set_attributes(attributes: impl IntoIterator<Item = KeyValue>) {
    let span = Span::current();
    if span.is_disabled() {
        return;
    }
    for attribute in attributes {
        span.set_attribute(attribute.key, attribute.value);
    }
}
