//! mirrorsync CLI
//!
//! Mirrors the city/country catalog into local stores.
//!
//! # Commands
//!
//! - `sync` - Run one sync and exit
//! - `watch` - Keep a collection in sync until interrupted
//! - `inspect` - Display the records of a local store

mod catalog;
mod client;
mod commands;
mod error;

use catalog::{City, Collection, Country};
use clap::{Parser, Subcommand};
use commands::RemoteOptions;
use mirrorsync_engine::SyncConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Offline-first catalog mirror.
#[derive(Parser)]
#[command(name = "mirrorsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the local stores
    #[arg(global = true, short, long, default_value = "mirrorsync-data")]
    data_dir: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by commands that contact the catalog.
#[derive(clap::Args)]
struct RemoteArgs {
    /// Directory serving the catalog API responses
    #[arg(short, long)]
    remote_dir: PathBuf,

    /// Base URL of the catalog API
    #[arg(long, default_value = "http://localhost:3000")]
    base_url: String,

    /// host:port to probe for reachability (always reachable if omitted)
    #[arg(long)]
    probe: Option<String>,
}

impl From<RemoteArgs> for RemoteOptions {
    fn from(args: RemoteArgs) -> Self {
        Self {
            base_url: args.base_url,
            remote_dir: args.remote_dir,
            probe: args.probe,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync and exit
    Sync {
        /// Collection to sync
        collection: Collection,

        #[command(flatten)]
        remote: RemoteArgs,

        /// Seconds to wait for the run to finish
        #[arg(short, long, default_value = "30")]
        timeout: u64,
    },

    /// Keep a collection in sync until interrupted
    Watch {
        /// Collection to sync
        collection: Collection,

        #[command(flatten)]
        remote: RemoteArgs,

        /// Seconds between periodic syncs
        #[arg(short, long, default_value = "30")]
        interval: u64,

        /// Minimum seconds between the starts of two runs
        #[arg(long, default_value = "3")]
        throttle: u64,
    },

    /// Display the records of a local store
    Inspect {
        /// Collection to inspect
        collection: Collection,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Sync {
            collection,
            remote,
            timeout,
        } => {
            let remote = RemoteOptions::from(remote);
            let timeout = Duration::from_secs(timeout);
            match collection {
                Collection::Cities => {
                    commands::sync::run::<City>(&cli.data_dir, &remote, timeout).await?;
                }
                Collection::Countries => {
                    commands::sync::run::<Country>(&cli.data_dir, &remote, timeout).await?;
                }
            }
        }
        Commands::Watch {
            collection,
            remote,
            interval,
            throttle,
        } => {
            let remote = RemoteOptions::from(remote);
            let config = SyncConfig::new()
                .with_refresh_interval(Duration::from_secs(interval))
                .with_throttle_window(Duration::from_secs(throttle));
            match collection {
                Collection::Cities => {
                    commands::watch::run::<City>(&cli.data_dir, &remote, config).await?;
                }
                Collection::Countries => {
                    commands::watch::run::<Country>(&cli.data_dir, &remote, config).await?;
                }
            }
        }
        Commands::Inspect { collection, format } => match collection {
            Collection::Cities => commands::inspect::run::<City>(&cli.data_dir, &format)?,
            Collection::Countries => commands::inspect::run::<Country>(&cli.data_dir, &format)?,
        },
        Commands::Version => {
            println!("mirrorsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
