//! Connection configuration and request methods.

use opentelemetry::global;
use opentelemetry::propagation::Injector;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::{CacheHealth, CacheStats, ClientError, DeletePatternResponse, DeleteResponse, EntryResponse};
use crate::service::{ErrorResponse, SetEntryRequest};

/// Connection settings for a Spyglass server.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Base URL, e.g. `http://localhost:3001`.
    pub endpoint: String,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3001".into(),
        }
    }
}

/// Writes propagation headers into a request header map.
struct HeaderInjector<'a>(&'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            self.0.insert(name, value);
        }
    }
}

/// Client for the cache endpoints.
#[derive(Debug, Clone)]
pub struct SpyglassClient {
    base: Url,
    http: Client,
}

impl SpyglassClient {
    /// Create a client for the configured endpoint.
    pub fn connect(config: ConnectConfig) -> Result<Self, ClientError> {
        let mut base = Url::parse(&config.endpoint)
            .map_err(|e| ClientError::InvalidEndpoint(format!("{}: {e}", config.endpoint)))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidEndpoint(config.endpoint));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            base,
            http: Client::new(),
        })
    }

    /// URL for `segments` below the base path; each segment is
    /// percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Attach the current trace context to an outgoing request.
    fn traced(&self, request: RequestBuilder) -> RequestBuilder {
        let mut headers = HeaderMap::new();
        let cx = tracing::Span::current().context();
        global::get_text_map_propagator(|propagator| {
            propagator.inject_context(&cx, &mut HeaderInjector(&mut headers));
        });
        request.headers(headers)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = self.traced(request).send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        Err(ClientError::Status { status, message })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        Ok(self.send(request).await?.json().await?)
    }

    /// Fetch a value; `None` when the key is absent or expired.
    pub async fn get(&self, key: &str) -> Result<Option<Value>, ClientError> {
        let request = self.http.get(self.url(&["cache", "entries", key]));
        match self.send_json::<EntryResponse>(request).await {
            Ok(entry) => Ok(Some(entry.value)),
            Err(ClientError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Store a value; without `ttl_seconds` the server default applies.
    pub async fn set(
        &self,
        key: &str,
        value: Value,
        ttl_seconds: Option<u64>,
    ) -> Result<(), ClientError> {
        let body = SetEntryRequest { value, ttl_seconds };
        let request = self.http.put(self.url(&["cache", "entries", key])).json(&body);
        self.send(request).await?;
        Ok(())
    }

    /// Delete a key. Returns whether it existed.
    pub async fn delete(&self, key: &str) -> Result<bool, ClientError> {
        let request = self.http.delete(self.url(&["cache", "entries", key]));
        let response: DeleteResponse = self.send_json(request).await?;
        Ok(response.deleted)
    }

    /// Delete every key matching `pattern`. Returns the number removed.
    pub async fn delete_pattern(&self, pattern: &str) -> Result<usize, ClientError> {
        let request = self
            .http
            .delete(self.url(&["cache"]))
            .query(&[("pattern", pattern)]);
        let response: DeletePatternResponse = self.send_json(request).await?;
        Ok(response.count)
    }

    /// Cache health snapshot.
    pub async fn health(&self) -> Result<CacheHealth, ClientError> {
        self.send_json(self.http.get(self.url(&["cache", "health"])))
            .await
    }

    /// Cache hit/miss statistics.
    pub async fn stats(&self) -> Result<CacheStats, ClientError> {
        self.send_json(self.http.get(self.url(&["cache", "stats"])))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> SpyglassClient {
        SpyglassClient::connect(ConnectConfig {
            endpoint: endpoint.into(),
        })
        .unwrap()
    }

    #[test]
    fn test_url_building() {
        let client = client("http://localhost:3001");
        assert_eq!(
            client.url(&["cache", "entries", "product:1"]).as_str(),
            "http://localhost:3001/cache/entries/product:1"
        );
    }

    #[test]
    fn test_url_keeps_base_path() {
        let client = client("http://gateway.local/spyglass");
        assert_eq!(
            client.url(&["cache", "health"]).as_str(),
            "http://gateway.local/spyglass/cache/health"
        );
    }

    #[test]
    fn test_keys_are_percent_encoded() {
        let client = client("http://localhost:3001/");
        assert_eq!(
            client.url(&["cache", "a/b c"]).as_str(),
            "http://localhost:3001/cache/a%2Fb%20c"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        let result = SpyglassClient::connect(ConnectConfig {
            endpoint: "not a url".into(),
        });
        assert!(matches!(result, Err(ClientError::InvalidEndpoint(_))));

        let result = SpyglassClient::connect(ConnectConfig {
            endpoint: "mailto:ops@example.com".into(),
        });
        assert!(matches!(result, Err(ClientError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_header_injector_skips_invalid_names() {
        let mut headers = HeaderMap::new();
        let mut injector = HeaderInjector(&mut headers);
        injector.set("traceparent", "00-abc-def-01".into());
        injector.set("bad header", "x".into());

        assert_eq!(headers.len(), 1);
        assert_eq!(headers["traceparent"], "00-abc-def-01");
    }
}
