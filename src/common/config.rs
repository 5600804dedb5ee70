//! Configuration for votetally components
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `VOTETALLY__*` environment variables. Binaries apply CLI flags last.

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Highest partition key produced by the first-letter routing function ('Z').
pub const MAX_PARTITION_KEY: i64 = 25;

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Node ID (unique identifier)
    #[serde(default = "default_node_id")]
    pub node_id: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Partition-specific config
    #[serde(default)]
    pub partition: PartitionConfig,

    /// Aggregate web front-end config
    #[serde(default)]
    pub web: WebConfig,
}

fn default_node_id() -> String {
    "node-1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            log_level: default_log_level(),
            partition: PartitionConfig::default(),
            web: WebConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let config: Config = builder
            .add_source(
                config::Environment::with_prefix("VOTETALLY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }
}

/// Partition process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Bind address for the partition-local HTTP API
    #[serde(default = "default_partition_bind")]
    pub bind_addr: SocketAddr,

    /// RocksDB directory; the in-memory engine is used when absent
    #[serde(default)]
    pub data_path: Option<PathBuf>,

    /// Lowest partition key owned by this partition (inclusive)
    #[serde(default)]
    pub low_key: i64,

    /// Highest partition key owned by this partition (inclusive)
    #[serde(default = "default_high_key")]
    pub high_key: i64,

    /// Seconds between integrity checks
    #[serde(default = "default_integrity_interval")]
    pub integrity_interval_secs: u64,

    /// How long a transaction waits for a row lock before giving up
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,
}

fn default_partition_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8081))
}
fn default_high_key() -> i64 {
    MAX_PARTITION_KEY
}
fn default_integrity_interval() -> u64 {
    5
}
fn default_lock_timeout() -> u64 {
    5_000
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_partition_bind(),
            data_path: None,
            low_key: 0,
            high_key: default_high_key(),
            integrity_interval_secs: default_integrity_interval(),
            lock_timeout_ms: default_lock_timeout(),
        }
    }
}

impl PartitionConfig {
    pub fn integrity_interval(&self) -> Duration {
        Duration::from_secs(self.integrity_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        validate_range(self.low_key, self.high_key)?;
        if self.integrity_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "integrity_interval_secs must be greater than zero".into(),
            ));
        }
        if self.lock_timeout_ms == 0 || i64::try_from(self.lock_timeout_ms).is_err() {
            return Err(Error::InvalidConfig(format!(
                "lock_timeout_ms must be between 1 and {}",
                i64::MAX
            )));
        }
        Ok(())
    }
}

/// A partition as seen by the front-end: its key range and where to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDescriptor {
    pub low_key: i64,
    pub high_key: i64,
    /// Base URL of the partition (or of a gateway that routes on `PartitionKey`)
    pub address: String,
}

impl PartitionDescriptor {
    pub fn new(low_key: i64, high_key: i64, address: impl Into<String>) -> Self {
        Self {
            low_key,
            high_key,
            address: address.into(),
        }
    }

    pub fn contains(&self, key: i64) -> bool {
        (self.low_key..=self.high_key).contains(&key)
    }
}

/// Aggregate front-end configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Bind address for the public HTTP API
    #[serde(default = "default_web_bind")]
    pub bind_addr: SocketAddr,

    /// Logical name of the partitioned vote store
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Upper bound for every call to a single partition
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Static partition directory for `service_name`
    #[serde(default)]
    pub partitions: Vec<PartitionDescriptor>,
}

fn default_web_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}
fn default_service_name() -> String {
    "VotingData".to_string()
}
fn default_request_timeout() -> u64 {
    5_000
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_web_bind(),
            service_name: default_service_name(),
            request_timeout_ms: default_request_timeout(),
            partitions: Vec::new(),
        }
    }
}

impl WebConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "request_timeout_ms must be greater than zero".into(),
            ));
        }
        for partition in &self.partitions {
            validate_range(partition.low_key, partition.high_key)?;
            if partition.address.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "partition [{}, {}] has no address",
                    partition.low_key, partition.high_key
                )));
            }
        }
        Ok(())
    }
}

fn validate_range(low: i64, high: i64) -> Result<()> {
    if low < 0 || high > MAX_PARTITION_KEY || low > high {
        return Err(Error::InvalidConfig(format!(
            "invalid partition key range [{}, {}]",
            low, high
        )));
    }
    Ok(())
}
