//! CLI for casting votes and inspecting the tally

use clap::{Parser, Subcommand};
use std::time::Duration;
use votetally::common::retry_with_backoff;
use votetally::TallyClient;

#[derive(Parser)]
#[command(name = "votetally")]
#[command(about = "votetally partitioned voting CLI")]
#[command(version)]
struct Cli {
    /// Front-end URL
    #[arg(long, default_value = "http://localhost:8080")]
    web: String,

    /// Request timeout in milliseconds
    #[arg(long, default_value = "10000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the global tally
    List {
        /// Attempts when the front-end or partitions are unavailable
        #[arg(long, default_value = "3")]
        retries: usize,
    },

    /// Cast a vote
    Vote {
        /// Vote item name
        name: String,
    },

    /// Delete a vote item
    Delete {
        /// Vote item name
        name: String,
    },

    /// Show a partition's latest integrity report
    Health {
        /// Partition URL
        #[arg(long)]
        partition: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let client = TallyClient::new(&cli.web, Duration::from_millis(cli.timeout_ms))?;

    match cli.command {
        Commands::List { retries } => {
            let tally = retry_with_backoff(
                || client.tally(),
                retries.max(1),
                Duration::from_millis(200),
            )
            .await?;
            println!("Votes:");
            for vote in &tally.votes {
                println!("  {:<24} {}", vote.name, vote.count);
            }
            println!("Total ballots: {}", tally.total_ballots);
        }

        Commands::Vote { name } => {
            client.vote(&name).await?;
            println!("Voted for {}", name);
        }

        Commands::Delete { name } => {
            client.delete(&name).await?;
            println!("Deleted {}", name);
        }

        Commands::Health { partition } => {
            let report = client.partition_health(&partition).await?;
            println!("Partition health: {:?}", report.state);
            if let Some(description) = &report.description {
                println!("  {}", description);
            }
            println!("  Reported at: {}", report.reported_at);
        }
    }

    Ok(())
}
