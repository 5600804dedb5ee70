//! Partition process
//!
//! Each partition owns a disjoint range of partition keys and keeps:
//! - Vote counters and the ballot ledger in a transactional engine
//! - A background integrity check comparing the two
//! - The partition-local HTTP API used by the front-end

pub mod engine;
pub mod http;
pub mod integrity;
pub mod server;
pub mod store;

pub use server::PartitionServer;
pub use store::{CounterStore, VoteCount};
