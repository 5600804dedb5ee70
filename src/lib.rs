//! # votetally
//!
//! A partitioned vote-tallying service:
//! - Per-item vote counters sharded by the first letter of the item name
//! - An independent per-partition ballot ledger for auditing
//! - A periodic integrity check that reports ledger/counter mismatches
//! - A stateless front-end that routes writes and aggregates reads
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               Front-end                 │
//! │  GET /api/votes   → fan out + merge     │
//! │  PUT/DELETE /api/votes/:name → route    │
//! └───────────┬─────────────────────────────┘
//!             │ HTTP (?PartitionKey=..&PartitionKind=Int64Range)
//!   ┌─────────┴──────────┬──────────────┐
//!   │                    │              │
//! ┌─▼──────────┐   ┌─────▼──────┐   ┌──▼───────────┐
//! │ Partition  │   │ Partition  │   │ Partition    │
//! │  A..I      │   │  J..R      │   │  S..Z        │
//! │ + ledger   │   │ + ledger   │   │ + ledger     │
//! └────────────┘   └────────────┘   └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start a partition
//! ```bash
//! votetally-partition serve \
//!   --id part-1 \
//!   --bind 0.0.0.0:8081 \
//!   --low-key 0 --high-key 8 \
//!   --data ./part-1-data
//! ```
//!
//! ### Start the front-end
//! ```bash
//! votetally-web serve --id web-1 --bind 0.0.0.0:8080 --config ./votetally.toml
//! ```
//!
//! ### Use the CLI
//! ```bash
//! votetally vote Coke
//! votetally list
//! votetally delete Coke
//! votetally health --partition http://localhost:8081
//! ```

#![allow(clippy::result_large_err)]

pub mod client;
pub mod common;
pub mod partition;
pub mod web;

// Re-export commonly used types
pub use client::TallyClient;
pub use common::{Config, Error, Result};
pub use partition::PartitionServer;
pub use web::WebServer;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
