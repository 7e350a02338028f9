//! In-memory key-value cache with TTL expiry.
//!
//! Provides:
//! - get/set/delete/pattern-delete, each wrapped in a span
//! - Lazy expiry on read plus a periodic sweep of expired entries
//! - Hit/miss statistics and a health snapshot

mod pattern;

pub use pattern::KeyPattern;

use opentelemetry::KeyValue;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::observability::metrics::{record_cache_entries, record_cache_operation};
use crate::observability::span::in_span;

/// Reported in spans and health checks.
pub const CACHE_TYPE: &str = "in-memory";

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default interval between sweeps of expired entries.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Errors from the typed cache helpers.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL applied by [`Cache::set_default`].
    pub default_ttl: Duration,
    /// How often expired entries are swept.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Health snapshot of the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheHealth {
    pub status: String,
    pub size: usize,
    #[serde(rename = "type")]
    pub cache_type: String,
}

/// Hit/miss counters for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate between 0.0 and 1.0; 0.0 before any lookup.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    /// `None` when the TTL is too large to represent; such entries never expire.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn live_value(&self, now: Instant) -> Option<Value> {
        (!self.is_expired(now)).then(|| self.value.clone())
    }
}

/// Span attributes shared by every operation.
fn span_attributes(operation: &'static str, target: KeyValue) -> Vec<KeyValue> {
    vec![
        target,
        KeyValue::new("cache.operation", operation),
        KeyValue::new("cache.type", CACHE_TYPE),
    ]
}

/// In-memory cache of JSON values.
#[derive(Debug)]
pub struct Cache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl Cache {
    /// Create an empty cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Create a shared cache and log that it is ready.
    pub fn initialize(config: CacheConfig) -> Arc<Self> {
        tracing::info!(
            default_ttl_secs = config.default_ttl.as_secs(),
            sweep_interval_secs = config.sweep_interval.as_secs(),
            "In-memory cache initialized"
        );
        Arc::new(Self::new(config))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a live value.
    ///
    /// An entry found expired is removed and reported as a miss.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let attributes = span_attributes("get", KeyValue::new("cache.key", key.to_string()));
        in_span("cache.get", attributes, |span| async move {
            let now = Instant::now();
            let mut entries = self.entries.write().await;

            let lookup = entries.get(key).map(|entry| entry.live_value(now));
            let value = match lookup {
                Some(Some(value)) => Some(value),
                Some(None) => {
                    entries.remove(key);
                    None
                }
                None => None,
            };
            drop(entries);

            if value.is_some() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key, "cache.hit");
                record_cache_operation("get", "hit");
            } else {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key, "cache.miss");
                record_cache_operation("get", "miss");
            }
            span.set_attribute("cache.hit", value.is_some());
            value
        })
        .await
    }

    /// Store a value for `ttl`, replacing any existing entry.
    ///
    /// A zero TTL stores an entry that is already expired.
    pub async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let ttl_secs = ttl.as_secs();
        let mut attributes = span_attributes("set", KeyValue::new("cache.key", key.to_string()));
        attributes.push(KeyValue::new(
            "cache.ttl",
            i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        ));

        in_span("cache.set", attributes, |_span| async move {
            let entry = CacheEntry {
                value,
                expires_at: Instant::now().checked_add(ttl),
            };
            let size = {
                let mut entries = self.entries.write().await;
                entries.insert(key.to_string(), entry);
                entries.len()
            };

            tracing::debug!(key, ttl = ttl_secs, "cache.stored");
            record_cache_operation("set", "stored");
            record_cache_entries(size);
        })
        .await;
    }

    /// Store a value with the configured default TTL.
    pub async fn set_default(&self, key: &str, value: Value) {
        self.set(key, value, self.config.default_ttl).await;
    }

    /// Remove a key. Returns whether it was present.
    pub async fn delete(&self, key: &str) -> bool {
        let attributes = span_attributes("delete", KeyValue::new("cache.key", key.to_string()));
        in_span("cache.delete", attributes, |_span| async move {
            let (existed, size) = {
                let mut entries = self.entries.write().await;
                let existed = entries.remove(key).is_some();
                (existed, entries.len())
            };

            tracing::debug!(key, existed, "cache.deleted");
            record_cache_operation("delete", if existed { "deleted" } else { "absent" });
            record_cache_entries(size);
            existed
        })
        .await
    }

    /// Remove every key matching `pattern` (see [`KeyPattern`]).
    ///
    /// Returns the number of removed keys.
    pub async fn delete_pattern(&self, pattern: &str) -> usize {
        let matcher = KeyPattern::new(pattern);
        let attributes = span_attributes(
            "delete_pattern",
            KeyValue::new("cache.pattern", matcher.as_str().to_string()),
        );
        in_span("cache.delete_pattern", attributes, |_span| async move {
            let (count, size) = {
                let mut entries = self.entries.write().await;
                let before = entries.len();
                entries.retain(|key, _| !matcher.matches(key));
                (before - entries.len(), entries.len())
            };

            tracing::debug!(pattern = %matcher, count, "cache.pattern_deleted");
            record_cache_operation("delete_pattern", "deleted");
            record_cache_entries(size);
            count
        })
        .await
    }

    /// Remove every expired entry. Returns the number removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let (removed, size) = {
            let mut entries = self.entries.write().await;
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired(now));
            (before - entries.len(), entries.len())
        };

        if removed > 0 {
            tracing::debug!(removed, remaining = size, "Swept expired cache entries");
        }
        record_cache_entries(size);
        removed
    }

    /// Sweep expired entries every `sweep_interval` until shutdown.
    pub fn spawn_sweeper(self: &Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        let period = self.config.sweep_interval.max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        cache.sweep_expired().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("Cache sweeper stopped");
        })
    }

    /// Current health snapshot.
    pub async fn check_health(&self) -> CacheHealth {
        CacheHealth {
            status: "healthy".to_string(),
            size: self.len().await,
            cache_type: CACHE_TYPE.to_string(),
        }
    }

    /// Hit/miss counters and entry count.
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len().await,
        }
    }

    /// Number of stored entries, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every entry.
    pub async fn close(&self) {
        self.entries.write().await.clear();
        record_cache_entries(0);
        tracing::debug!("Cache cleared");
    }

    /// Look up a live value and deserialize it.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get(key).await {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Serialize and store a value for `ttl`.
    pub async fn set_as<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(value)?;
        self.set(key, value, ttl).await;
        Ok(())
    }
}
