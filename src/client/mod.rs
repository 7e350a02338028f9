//! HTTP client library for the Spyglass cache API.
//!
//! Used by the `spyglassctl` CLI and by integration tests.

mod connection;

pub use connection::{ConnectConfig, SpyglassClient};

// Re-export wire types that clients need
pub use crate::cache::{CacheHealth, CacheStats};
pub use crate::service::{DeletePatternResponse, DeleteResponse, EntryResponse};

use thiserror::Error;

/// Errors returned by [`SpyglassClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint URL could not be parsed.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The request could not be sent or its body could not be read.
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with an unexpected status.
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },
}
