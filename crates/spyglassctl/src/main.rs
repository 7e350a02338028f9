//! spyglassctl: Command-line interface for the Spyglass cache API.
//!
//! Clears cached product listings after a deploy and inspects individual
//! cache entries from the terminal.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Command-line interface for the Spyglass cache API.
#[derive(Parser)]
#[command(name = "spyglassctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Spyglass server endpoint (e.g., http://localhost:3001)
    #[arg(short, long, env = "SPYGLASS_ENDPOINT", default_value = "http://localhost:3001")]
    endpoint: String,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Delete cached entries by wildcard pattern
    Clear {
        /// Key pattern, `*` matches any run of characters (repeatable)
        #[arg(short, long = "pattern", default_values_t = commands::clear::default_patterns())]
        patterns: Vec<String>,
    },
    /// Show a cached value
    Get {
        /// Cache key
        key: String,
    },
    /// Store a JSON value
    Set {
        /// Cache key
        key: String,
        /// JSON value (bare words are stored as strings)
        value: String,
        /// Time to live in seconds (server default when omitted)
        #[arg(short, long)]
        ttl: Option<u64>,
    },
    /// Delete a single key
    Delete {
        /// Cache key
        key: String,
    },
    /// Show cache health and statistics
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let config = spyglass::client::ConnectConfig {
        endpoint: cli.endpoint,
    };

    match cli.command {
        Commands::Clear { patterns } => {
            commands::clear::run(config, &patterns, cli.output).await?;
        }
        Commands::Get { key } => commands::cache::get(config, &key, cli.output).await?,
        Commands::Set { key, value, ttl } => {
            commands::cache::set(config, &key, &value, ttl, cli.output).await?;
        }
        Commands::Delete { key } => commands::cache::delete(config, &key, cli.output).await?,
        Commands::Health => commands::health::run(config, cli.output).await?,
    }

    Ok(())
}
