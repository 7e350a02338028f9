//! Spyglass: an OpenTelemetry-instrumented API service with a traced in-memory cache.
//!
//! Every cache operation runs inside its own span, structured logs carry the
//! active trace context, and telemetry is exported over OTLP/HTTP either
//! directly to a backend or through a local collector.
//!
//! # Architecture
//!
//! - **Traced cache**: TTL entries, wildcard invalidation, periodic sweep
//! - **Leveled logger**: OTel severity numbers, console plus OTLP export
//! - **Span helpers**: wrap async work with status and exception recording
//! - **HTTP API**: axum routes with W3C trace context extraction
//!
//! # Modules
//!
//! - [`cache`]: In-memory TTL cache
//! - [`client`]: HTTP client for the cache API
//! - [`config`]: CLI and environment configuration
//! - [`observability`]: Tracing, logging and metrics setup
//! - [`server`]: HTTP server setup
//! - [`service`]: Request handlers and wire types

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // cache::CacheConfig is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc,      // Panic docs can be verbose
    clippy::struct_excessive_bools,  // Config structs may have flags
    clippy::too_many_lines           // Some functions are inherently long
)]

pub mod cache;
pub mod client;
pub mod config;
pub mod observability;
pub mod server;
pub mod service;
