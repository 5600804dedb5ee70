//! Front-end: routing and cross-partition aggregation
//!
//! The front-end owns no vote state. It is responsible for:
//! - Routing writes to the partition owning an item's first letter
//! - Fanning reads out to every partition and merging the results
//! - Serving the public HTTP API

pub mod aggregator;
pub mod http;
pub mod locator;
pub mod partition_client;
pub mod server;

pub use aggregator::{Aggregator, GlobalTally};
pub use server::WebServer;
