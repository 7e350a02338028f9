//! Spyglass: an OpenTelemetry-instrumented API service.
//!
//! # Usage
//!
//! ```bash
//! spyglass --port 3001 --otel-mode collector --log-level info
//! ```
//!
//! Environment variables can also be used (a `.env` file is loaded first):
//! - `SPYGLASS_PORT`: Port to listen on
//! - `OTEL_SERVICE_NAME`: Service name reported in telemetry
//! - `OTEL_MODE`: `direct` or `collector`
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use spyglass::config::Config;
use spyglass::observability::tracing::init_telemetry;
use spyglass::server::run_server;
use tokio::sync::watch;

/// Print startup banner with version and configuration.
fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        r#"
   ____                  _
  / ___| _ __  _   _  __| | __ _ ___ ___
  \___ \| '_ \| | | |/ _` |/ _` / __/ __|
   ___) | |_) | |_| | (_| | (_| \__ \__ \
  |____/| .__/ \__, |\__, |\__,_|___/___/
        |_|    |___/ |___/

  Spyglass v{} - Instrumented API Service

  Configuration:
    Address:     {}:{}
    Service:     {} ({})
    OTel Mode:   {}
    Cache TTL:   {}s (sweep every {}s)
    Log Level:   {}

  Press Ctrl+C to shutdown gracefully.
"#,
        version,
        config.host,
        config.port,
        config.service_name,
        config.environment,
        config.otel_mode,
        config.cache_ttl_secs,
        config.cache_sweep_secs,
        config.log_level
    );
}

/// Resolve once SIGINT or SIGTERM arrives.
async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {
                        tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
                    }
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM, initiating shutdown...");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler, listening for Ctrl+C only");
                if let Err(e) = ctrl_c.await {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = ctrl_c.await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        tracing::info!("Received Ctrl+C, initiating shutdown...");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    // Initialize tracing, logging and metrics
    let telemetry = init_telemetry(&config)?;

    print_banner(&config);

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let result = run_server(config, shutdown_rx).await;

    // Provider shutdown blocks on the final export
    match tokio::task::spawn_blocking(move || telemetry.shutdown()).await? {
        Ok(()) => tracing::info!("Telemetry flushed"),
        Err(e) => tracing::error!(error = %e, "Telemetry shutdown failed"),
    }

    result?;
    tracing::info!("Spyglass shutdown complete");
    Ok(())
}
