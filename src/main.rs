//! Song relay CLI - main entry point
//!
//! Runs the bot by default; the other subcommands inspect the catalog file.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use song_relay::search::{SearchOptions, DEFAULT_LIMIT, DEFAULT_THRESHOLD};
use song_relay::{commands, metrics};
use tracing::warn;

#[derive(Parser)]
#[command(name = "song_relay")]
#[command(about = "Telegram group song relay & catalog bot", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot (default)
    Run,

    /// Print catalog statistics
    Stats {
        /// Catalog file (defaults to the configured one)
        #[arg(short, long)]
        catalog: Option<PathBuf>,

        /// Number of performers to list
        #[arg(short, long, default_value = "10")]
        top: usize,
    },

    /// Fuzzy-search the catalog by title
    Search {
        /// Title to look for
        query: String,

        /// Catalog file (defaults to the configured one)
        #[arg(short, long)]
        catalog: Option<PathBuf>,

        /// Maximum number of results
        #[arg(short, long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,

        /// Minimum similarity (0..1)
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,
    },

    /// Print a random pick of songs
    Sample {
        /// Number of songs
        #[arg(short, default_value = "3")]
        n: usize,

        /// Catalog file (defaults to the configured one)
        #[arg(short, long)]
        catalog: Option<PathBuf>,

        /// Topic ids to leave out, comma-separated
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("song_relay=info".parse()?))
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    execute_command(cli.command.unwrap_or(Commands::Run)).await
}

async fn execute_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run => {
            commands::run_bot().await?;
        }
        Commands::Stats { catalog, top } => {
            commands::stats::run(&commands::catalog_path(catalog), top)?;
        }
        Commands::Search {
            query,
            catalog,
            limit,
            threshold,
        } => {
            let options = SearchOptions { limit, threshold };
            commands::search::run(&commands::catalog_path(catalog), &query, options)?;
        }
        Commands::Sample {
            n,
            catalog,
            exclude,
        } => {
            commands::sample::run(&commands::catalog_path(catalog), n, &exclude)?;
        }
    }

    Ok(())
}
