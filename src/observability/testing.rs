//! In-memory span capture for unit tests.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::Value;
use opentelemetry_sdk::export::trace::SpanData;
use opentelemetry_sdk::testing::trace::{InMemorySpanExporter, InMemorySpanExporterBuilder};
use opentelemetry_sdk::trace::TracerProvider;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::SubscriberExt;

/// Routes spans on the current thread into an in-memory exporter until
/// dropped.
pub struct SpanCapture {
    exporter: InMemorySpanExporter,
    provider: TracerProvider,
    _guard: DefaultGuard,
}

impl SpanCapture {
    pub fn install() -> Self {
        let exporter = InMemorySpanExporterBuilder::new().build();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let tracer = provider.tracer("spyglass-test");
        let subscriber =
            tracing_subscriber::registry().with(tracing_opentelemetry::layer().with_tracer(tracer));
        let guard = tracing::subscriber::set_default(subscriber);

        Self {
            exporter,
            provider,
            _guard: guard,
        }
    }

    /// All spans finished so far.
    pub fn spans(&self) -> Vec<SpanData> {
        let _ = self.provider.force_flush();
        self.exporter
            .get_finished_spans()
            .expect("in-memory exporter poisoned")
    }

    pub fn spans_named(&self, name: &str) -> Vec<SpanData> {
        self.spans()
            .into_iter()
            .filter(|span| span.name == name)
            .collect()
    }

    /// The one finished span called `name`; panics otherwise.
    pub fn single(&self, name: &str) -> SpanData {
        let mut spans = self.spans_named(name);
        assert_eq!(spans.len(), 1, "expected exactly one `{name}` span");
        spans.remove(0)
    }

    pub fn attribute(&self, span: &SpanData, key: &str) -> Option<Value> {
        span.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.clone())
    }

    pub fn attribute_str(&self, span: &SpanData, key: &str) -> Option<String> {
        self.attribute(span, key)
            .map(|value| value.as_str().into_owned())
    }

    /// Names of the span events recorded on `span`, in order.
    pub fn event_names(&self, span: &SpanData) -> Vec<String> {
        span.events
            .iter()
            .map(|event| event.name.to_string())
            .collect()
    }
}
