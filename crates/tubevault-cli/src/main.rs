//! # TubeVault client
//!
//! Command-line companion for a TubeVault backend.
//!
//! ## Usage
//!
//! ```bash
//! # Follow job and queue activity (default)
//! tubevault
//!
//! # Run with custom config
//! tubevault --config /path/to/tubevault.toml watch
//!
//! # Inspect routing
//! tubevault routes
//! tubevault resolve "/watch/abc123?t=120"
//!
//! # Run with environment variables
//! TUBEVAULT_ORIGIN=http://nas.local:8032 tubevault
//! ```

mod commands;
mod config;
mod metrics;
mod watcher;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tubevault")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Follow and inspect a TubeVault backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (default: search the standard locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow job and queue activity until Ctrl-C
    Watch,

    /// Check backend health
    Health,

    /// List the registered pages
    Routes,

    /// Resolve a URL to a route
    Resolve {
        /// Path and query, e.g. /watch/abc123?t=120
        url: String,
        /// Ship routing anomalies to the backend
        #[arg(long)]
        report: bool,
    },

    /// Show or change the theme (dark, light, toggle)
    Theme { value: Option<String> },

    /// Pin a playlist for one-click adding, or show the pinned one
    Pin {
        #[arg(requires = "name")]
        id: Option<i64>,
        name: Option<String>,
    },

    /// Unpin the pinned playlist
    Unpin,

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tubevault=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => config::Config::from_file(path)?,
        None => config::Config::load()?,
    };

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => {
            tracing::info!("Starting TubeVault watcher for {}", config.backend.origin);

            metrics::init_metrics();
            if config.metrics.enabled {
                if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
                    tracing::error!("Failed to start metrics server: {}", e);
                }
            }

            watcher::run(&config).await?;
        }
        Commands::Health => {
            let client = tubevault_api::ApiClient::new(config.api_config()?)?;
            if !watcher::check_health(&client).await {
                anyhow::bail!("Backend at {} is not healthy", client.base_url());
            }
        }
        Commands::Routes => commands::routes(),
        Commands::Resolve { url, report } => commands::resolve(&config, &url, report).await?,
        Commands::Theme { value } => commands::theme(&config, value.as_deref())?,
        Commands::Pin { id, name } => commands::pin(&config, id.zip(name)),
        Commands::Unpin => commands::unpin(&config),
        Commands::Config => print!("{}", toml::to_string_pretty(&config)?),
    }

    Ok(())
}
