//! Front-end binary

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use votetally::{
    common::{config::Config, PartitionDescriptor},
    WebServer,
};

#[derive(Parser)]
#[command(name = "votetally-web")]
#[command(about = "votetally front-end: routes votes and aggregates partition tallies")]
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
    /// Start front-end server
    Serve {
        /// Node ID
        #[arg(long)]
        id: Option<String>,

        /// Bind address for HTTP
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Logical name of the partitioned vote store
        #[arg(long)]
        service: Option<String>,

        /// Per-partition call timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Partitions as LOW-HIGH=URL (comma-separated), e.g. 0-12=http://127.0.0.1:8081
        #[arg(long, value_delimiter = ',', value_parser = parse_partition)]
        partitions: Vec<PartitionDescriptor>,
    },
}

fn parse_partition(s: &str) -> Result<PartitionDescriptor, String> {
    let (range, address) = s
        .split_once('=')
        .ok_or_else(|| format!("expected LOW-HIGH=URL, got {}", s))?;
    let (low, high) = range
        .split_once('-')
        .ok_or_else(|| format!("expected LOW-HIGH, got {}", range))?;
    let low = low.trim().parse().map_err(|e| format!("bad low key: {}", e))?;
    let high = high.trim().parse().map_err(|e| format!("bad high key: {}", e))?;
    Ok(PartitionDescriptor::new(low, high, address.trim()))
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
            service,
            timeout_ms,
            partitions,
        } => {
            if let Some(id) = id {
                config.node_id = id;
            }
            let web = &mut config.web;
            if let Some(bind) = bind {
                web.bind_addr = bind;
            }
            if let Some(service) = service {
                web.service_name = service;
            }
            if let Some(timeout_ms) = timeout_ms {
                web.request_timeout_ms = timeout_ms;
            }
            if !partitions.is_empty() {
                web.partitions = partitions;
            }

            tracing::info!("votetally {}", votetally::BUILD_INFO);

            let shutdown = CancellationToken::new();
            spawn_signal_handler(shutdown.clone());

            WebServer::new(config.web, config.node_id)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partition() {
        let p = parse_partition("0-12=http://127.0.0.1:8081").unwrap();
        assert_eq!(p, PartitionDescriptor::new(0, 12, "http://127.0.0.1:8081"));
        assert!(parse_partition("0-12").is_err());
        assert!(parse_partition("x-12=http://a").is_err());
    }

    #[tokio::test]
    async fn test_signal_handler_waits_for_signal() {
        let shutdown = CancellationToken::new();
        spawn_signal_handler(shutdown.clone());
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!shutdown.is_cancelled());
    }
}
