//! HTTP server setup and lifecycle.
//!
//! Configures the axum router with:
//! - Cache endpoints
//! - Request spans with W3C trace context extraction
//! - Health and readiness probes
//! - Graceful shutdown support

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::cache::Cache;
use crate::config::Config;
use crate::observability::http::{make_request_span, record_response};
use crate::service::cache::{
    cache_health, cache_stats, delete_entry, delete_pattern, get_entry, put_entry,
};
use crate::service::health::{health_handler, ready_handler};

/// Server state shared across handlers.
#[derive(Debug)]
pub struct ServerState {
    pub cache: Arc<Cache>,
}

/// Create the HTTP router.
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/cache", axum::routing::delete(delete_pattern))
        .route("/cache/health", get(cache_health))
        .route("/cache/stats", get(cache_stats))
        .route(
            "/cache/entries/:key",
            get(get_entry).put(put_entry).delete(delete_entry),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(make_request_span)
                .on_response(record_response),
        )
        .with_state(state)
}

/// Serve on an already-bound listener until shutdown is signalled.
///
/// The cache sweeper runs alongside the server and stops with it; the
/// cache is cleared once both have stopped.
pub async fn serve(
    listener: TcpListener,
    state: Arc<ServerState>,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let sweeper = state.cache.spawn_sweeper(shutdown_rx.clone());
    let app = create_router(Arc::clone(&state));

    let mut server_shutdown = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.changed().await;
            tracing::info!("Shutdown signal received, stopping server");
        })
        .await?;

    tracing::info!("Waiting for cache sweeper to stop");
    sweeper.await?;
    state.cache.close().await;

    tracing::info!("Server stopped");
    Ok(())
}

/// Run the Spyglass HTTP server.
///
/// # Arguments
///
/// * `config` - Server configuration
/// * `shutdown_rx` - Receiver for shutdown signal
///
/// # Returns
///
/// Returns when the server has shut down.
pub async fn run_server(
    config: Config,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let state = Arc::new(ServerState {
        cache: Cache::initialize(config.cache_config()),
    });

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %listener.local_addr()?, "Starting Spyglass HTTP server");

    serve(listener, state, shutdown_rx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, CacheHealth};
    use crate::service::{DeletePatternResponse, EntryResponse};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state() -> Arc<ServerState> {
        Arc::new(ServerState {
            cache: Arc::new(Cache::new(CacheConfig::default())),
        })
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_router(state());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_endpoint() {
        let app = create_router(state());

        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_missing_key_is_404() {
        let app = create_router(state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/cache/entries/product:1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let state = state();

        let response = create_router(Arc::clone(&state))
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/cache/entries/product:1")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"value":{"name":"lamp"},"ttl_seconds":60}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .uri("/cache/entries/product:1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let entry: EntryResponse = body_json(response).await;
        assert_eq!(entry.key, "product:1");
        assert_eq!(entry.value, json!({"name": "lamp"}));
    }

    #[tokio::test]
    async fn test_status_route_names_are_usable_keys() {
        let state = state();

        let response = create_router(Arc::clone(&state))
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/cache/entries/health")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"value":"green"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = create_router(Arc::clone(&state))
            .oneshot(
                Request::builder()
                    .uri("/cache/entries/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let entry: EntryResponse = body_json(response).await;
        assert_eq!(entry.key, "health");
        assert_eq!(entry.value, json!("green"));

        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .uri("/cache/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let health: CacheHealth = body_json(response).await;
        assert_eq!(health.size, 1);
    }

    #[tokio::test]
    async fn test_delete_by_pattern() {
        let state = state();
        for key in ["products:all", "products:page:1", "product:9"] {
            state.cache.set(key, json!(1), Duration::from_secs(60)).await;
        }

        let response = create_router(Arc::clone(&state))
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/cache?pattern=products:*")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let deleted: DeletePatternResponse = body_json(response).await;
        assert_eq!(deleted.pattern, "products:*");
        assert_eq!(deleted.count, 2);
        assert_eq!(state.cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_without_pattern_is_400() {
        let app = create_router(state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/cache")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_request_span_continues_incoming_trace() {
        use crate::observability::testing::SpanCapture;
        use opentelemetry::trace::{SpanId, SpanKind, TraceId};
        use opentelemetry_sdk::propagation::TraceContextPropagator;

        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
        let capture = SpanCapture::install();

        let response = create_router(state())
            .oneshot(
                Request::builder()
                    .uri("/cache/entries/product:1")
                    .header(
                        "traceparent",
                        "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        // The request span stays open until the response body is gone
        drop(response);

        let span = capture.single("GET /cache/entries/:key");
        assert_eq!(
            span.span_context.trace_id(),
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap()
        );
        assert_eq!(
            span.parent_span_id,
            SpanId::from_hex("00f067aa0ba902b7").unwrap()
        );
        assert_eq!(span.span_kind, SpanKind::Server);
        assert_eq!(
            capture.attribute(&span, "http.response.status_code"),
            Some(opentelemetry::Value::I64(404))
        );

        // The cache lookup is a child of the request span
        let lookup = capture.single("cache.get");
        assert_eq!(lookup.parent_span_id, span.span_context.span_id());
    }

    #[tokio::test]
    async fn test_cache_health_endpoint() {
        let app = create_router(state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/cache/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let health: CacheHealth = body_json(response).await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.size, 0);
    }
}
