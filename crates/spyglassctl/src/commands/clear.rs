//! Clear command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use spyglass::client::{ConnectConfig, SpyglassClient};

use crate::OutputFormat;

/// Patterns cleared when none are given: product listings, then single products.
pub fn default_patterns() -> Vec<String> {
    vec!["products:*".to_string(), "product:*".to_string()]
}

#[derive(Serialize)]
struct ClearedPattern {
    pattern: String,
    count: usize,
}

#[derive(Serialize)]
struct ClearOutput {
    cleared: Vec<ClearedPattern>,
    total: usize,
}

pub async fn run(config: ConnectConfig, patterns: &[String], format: OutputFormat) -> Result<()> {
    let client = SpyglassClient::connect(config).context("failed to connect to server")?;

    let mut cleared = Vec::with_capacity(patterns.len());
    for pattern in patterns {
        let count = client
            .delete_pattern(pattern)
            .await
            .with_context(|| format!("failed to clear pattern: {}", pattern))?;

        if format == OutputFormat::Text {
            println!("Cleared {} entries matching {}", count, pattern);
        }
        cleared.push(ClearedPattern {
            pattern: pattern.clone(),
            count,
        });
    }

    let output = ClearOutput {
        total: cleared.iter().map(|c| c.count).sum(),
        cleared,
    };

    match format {
        OutputFormat::Text => {
            println!();
            println!("Total: {} entry(ies) cleared", output.total);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
