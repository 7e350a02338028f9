//! Cache endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use opentelemetry::KeyValue;

use super::{
    ApiError, DeletePatternResponse, DeleteResponse, EntryResponse, PatternQuery, SetEntryRequest,
};
use crate::cache::{CacheHealth, CacheStats};
use crate::observability::logger::logger;
use crate::server::ServerState;

/// Handle `GET /cache/entries/:key`.
pub async fn get_entry(
    State(state): State<Arc<ServerState>>,
    Path(key): Path<String>,
) -> Result<Json<EntryResponse>, ApiError> {
    match state.cache.get(&key).await {
        Some(value) => Ok(Json(EntryResponse { key, value })),
        None => Err(ApiError::NotFound(key)),
    }
}

/// Handle `PUT /cache/entries/:key`.
pub async fn put_entry(
    State(state): State<Arc<ServerState>>,
    Path(key): Path<String>,
    Json(request): Json<SetEntryRequest>,
) -> StatusCode {
    let ttl = request
        .ttl_seconds
        .map_or(state.cache.config().default_ttl, Duration::from_secs);
    state.cache.set(&key, request.value, ttl).await;
    StatusCode::NO_CONTENT
}

/// Handle `DELETE /cache/entries/:key`.
pub async fn delete_entry(
    State(state): State<Arc<ServerState>>,
    Path(key): Path<String>,
) -> Json<DeleteResponse> {
    let deleted = state.cache.delete(&key).await;
    Json(DeleteResponse { key, deleted })
}

/// Handle `DELETE /cache?pattern=...`.
pub async fn delete_pattern(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<PatternQuery>,
) -> Json<DeletePatternResponse> {
    let count = state.cache.delete_pattern(&query.pattern).await;

    logger().info(
        "Cache entries deleted by pattern",
        vec![
            KeyValue::new("cache.pattern", query.pattern.clone()),
            KeyValue::new("cache.deleted_count", i64::try_from(count).unwrap_or(i64::MAX)),
        ],
    );

    Json(DeletePatternResponse {
        pattern: query.pattern,
        count,
    })
}

/// Handle `GET /cache/health`.
pub async fn cache_health(State(state): State<Arc<ServerState>>) -> Json<CacheHealth> {
    Json(state.cache.check_health().await)
}

/// Handle `GET /cache/stats`.
pub async fn cache_stats(State(state): State<Arc<ServerState>>) -> Json<CacheStats> {
    Json(state.cache.stats().await)
}
