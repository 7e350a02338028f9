//! Test utilities and server harness for Spyglass tests.
//!
//! Provides:
//! - In-process test server on an ephemeral port
//! - HTTP client helpers

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use spyglass::cache::{Cache, CacheConfig};
use spyglass::client::{ConnectConfig, SpyglassClient};
use spyglass::server::{serve, ServerState};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A Spyglass server running in the test process.
pub struct TestServer {
    pub addr: SocketAddr,
    pub cache: Arc<Cache>,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<Result<(), Box<dyn std::error::Error + Send + Sync>>>,
}

impl TestServer {
    /// Start a server with the default cache configuration.
    pub async fn start() -> Self {
        Self::start_with(CacheConfig::default()).await
    }

    /// Start a server with a custom cache configuration.
    pub async fn start_with(config: CacheConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener");
        let addr = listener.local_addr().expect("listener has no address");

        let cache = Cache::initialize(config);
        let state = Arc::new(ServerState {
            cache: Arc::clone(&cache),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(serve(listener, state, shutdown_rx));

        Self {
            addr,
            cache,
            shutdown_tx,
            handle,
        }
    }

    /// Base URL of the running server.
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Create a client connected to this server.
    pub fn client(&self) -> SpyglassClient {
        SpyglassClient::connect(ConnectConfig {
            endpoint: self.endpoint(),
        })
        .expect("failed to create client")
    }

    /// Signal shutdown and wait for the server to stop.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
            .expect("server returned an error");
    }
}
