//! Single-key cache commands.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::Value;
use spyglass::client::{ConnectConfig, SpyglassClient};

use crate::OutputFormat;

#[derive(Serialize)]
struct EntryOutput<'a> {
    key: &'a str,
    value: &'a Value,
}

#[derive(Serialize)]
struct SetOutput<'a> {
    key: &'a str,
    ttl_seconds: Option<u64>,
}

#[derive(Serialize)]
struct DeleteOutput<'a> {
    key: &'a str,
    deleted: bool,
}

/// Interpret a command-line value as JSON, falling back to a plain string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub async fn get(config: ConnectConfig, key: &str, format: OutputFormat) -> Result<()> {
    let client = SpyglassClient::connect(config).context("failed to connect to server")?;

    let value = client
        .get(key)
        .await
        .with_context(|| format!("failed to get key: {}", key))?
        .ok_or_else(|| anyhow!("key not found: {}", key))?;

    match format {
        OutputFormat::Text => println!("{}", serde_json::to_string_pretty(&value)?),
        OutputFormat::Json => {
            let output = EntryOutput { key, value: &value };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

pub async fn set(
    config: ConnectConfig,
    key: &str,
    raw_value: &str,
    ttl_seconds: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let client = SpyglassClient::connect(config).context("failed to connect to server")?;

    client
        .set(key, parse_value(raw_value), ttl_seconds)
        .await
        .with_context(|| format!("failed to set key: {}", key))?;

    match format {
        OutputFormat::Text => match ttl_seconds {
            Some(ttl) => println!("Stored {} (ttl {}s)", key, ttl),
            None => println!("Stored {} (default ttl)", key),
        },
        OutputFormat::Json => {
            let output = SetOutput { key, ttl_seconds };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

pub async fn delete(config: ConnectConfig, key: &str, format: OutputFormat) -> Result<()> {
    let client = SpyglassClient::connect(config).context("failed to connect to server")?;

    let deleted = client
        .delete(key)
        .await
        .with_context(|| format!("failed to delete key: {}", key))?;

    match format {
        OutputFormat::Text => {
            if deleted {
                println!("Deleted {}", key);
            } else {
                println!("Key {} was not cached", key);
            }
        }
        OutputFormat::Json => {
            let output = DeleteOutput { key, deleted };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
