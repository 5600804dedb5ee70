//! Partition binary

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use votetally::{common::config::Config, PartitionServer};

#[derive(Parser)]
#[command(name = "votetally-partition")]
#[command(about = "votetally partition: vote counters and ballot ledger for a key range")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start partition server
    Serve {
        /// Node ID
        #[arg(long)]
        id: Option<String>,

        /// Bind address for HTTP
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// RocksDB directory (in-memory when omitted)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Lowest owned partition key
        #[arg(long)]
        low_key: Option<i64>,

        /// Highest owned partition key
        #[arg(long)]
        high_key: Option<i64>,

        /// Seconds between integrity checks
        #[arg(long)]
        integrity_interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config from file and environment, then override with CLI arguments
    let mut config = Config::load(cli.config.as_deref())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve {
            id,
            bind,
            data,
            low_key,
            high_key,
            integrity_interval,
        } => {
            if let Some(id) = id {
                config.node_id = id;
            }
            let partition = &mut config.partition;
            if let Some(bind) = bind {
                partition.bind_addr = bind;
            }
            if data.is_some() {
                partition.data_path = data;
            }
            if let Some(low_key) = low_key {
                partition.low_key = low_key;
            }
            if let Some(high_key) = high_key {
                partition.high_key = high_key;
            }
            if let Some(secs) = integrity_interval {
                partition.integrity_interval_secs = secs;
            }

            tracing::info!("votetally {}", votetally::BUILD_INFO);

            let shutdown = CancellationToken::new();
            spawn_signal_handler(shutdown.clone());

            PartitionServer::new(config.partition, config.node_id)
                .serve(shutdown)
                .await?;
        }
    }

    Ok(())
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        shutdown.cancel();
    });
}
