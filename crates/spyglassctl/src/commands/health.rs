//! Health command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use spyglass::client::{CacheHealth, CacheStats, ConnectConfig, SpyglassClient};

use crate::OutputFormat;

#[derive(Serialize)]
struct HealthOutput {
    health: CacheHealth,
    stats: CacheStats,
    hit_rate: f64,
}

pub async fn run(config: ConnectConfig, format: OutputFormat) -> Result<()> {
    let client = SpyglassClient::connect(config).context("failed to connect to server")?;

    let health = client.health().await.context("failed to fetch cache health")?;
    let stats = client.stats().await.context("failed to fetch cache stats")?;

    let output = HealthOutput {
        hit_rate: stats.hit_rate(),
        health,
        stats,
    };

    match format {
        OutputFormat::Text => {
            println!("{:<12} {}", "STATUS", output.health.status);
            println!("{:<12} {}", "TYPE", output.health.cache_type);
            println!("{:<12} {}", "ENTRIES", output.health.size);
            println!("{:<12} {}", "HITS", output.stats.hits);
            println!("{:<12} {}", "MISSES", output.stats.misses);
            println!("{:<12} {:.1}%", "HIT RATE", output.hit_rate * 100.0);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
