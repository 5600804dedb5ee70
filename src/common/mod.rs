//! Common utilities and types shared across votetally

pub mod config;
pub mod error;
pub mod tracing_middleware;
pub mod utils;

pub use config::{Config, PartitionConfig, PartitionDescriptor, WebConfig, MAX_PARTITION_KEY};
pub use error::{Error, Result};
pub use utils::{encode_name, retry_with_backoff, validate_name};
