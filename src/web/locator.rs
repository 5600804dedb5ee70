//! Partition routing and discovery
//!
//! Vote items are routed by the first letter of their name: 'A' (or 'a') maps
//! to key 0 and 'Z' to key 25. Each partition owns a contiguous key range.
//! The partition list comes from a [`PartitionDirectory`] and may change over
//! time, so callers enumerate it once per operation and never cache it.

use crate::common::{Error, PartitionDescriptor, Result, WebConfig};
use async_trait::async_trait;
use std::collections::HashMap;

/// Partition key for a vote item name
pub fn partition_key_for(name: &str) -> Result<i64> {
    let first = name
        .chars()
        .next()
        .ok_or_else(|| Error::InvalidInput("vote item name cannot be empty".into()))?;

    if !first.is_ascii_alphabetic() {
        return Err(Error::InvalidInput(format!(
            "vote item name must start with a letter: {}",
            name
        )));
    }

    Ok(i64::from(first.to_ascii_uppercase() as u8 - b'A'))
}

/// Source of the live partition list for a logical service
#[async_trait]
pub trait PartitionDirectory: Send + Sync {
    /// Every partition of `service`, ordered by low key
    async fn enumerate_partitions(&self, service: &str) -> Result<Vec<PartitionDescriptor>>;

    /// The partition of `service` owning `key`
    async fn locate(&self, service: &str, key: i64) -> Result<PartitionDescriptor> {
        self.enumerate_partitions(service)
            .await?
            .into_iter()
            .find(|p| p.contains(key))
            .ok_or(Error::PartitionNotFound(key))
    }
}

/// Directory backed by static configuration
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    services: HashMap<String, Vec<PartitionDescriptor>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(
        mut self,
        service: impl Into<String>,
        mut partitions: Vec<PartitionDescriptor>,
    ) -> Self {
        partitions.sort_by_key(|p| p.low_key);
        self.services.insert(service.into(), partitions);
        self
    }

    pub fn from_config(config: &WebConfig) -> Self {
        Self::new().with_service(config.service_name.clone(), config.partitions.clone())
    }
}

#[async_trait]
impl PartitionDirectory for StaticDirectory {
    async fn enumerate_partitions(&self, service: &str) -> Result<Vec<PartitionDescriptor>> {
        self.services
            .get(service)
            .cloned()
            .ok_or_else(|| Error::ServiceNotFound(service.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_key_for() {
        assert_eq!(partition_key_for("Apple").unwrap(), 0);
        assert_eq!(partition_key_for("Avocado").unwrap(), 0);
        assert_eq!(partition_key_for("apple").unwrap(), 0);
        assert_eq!(partition_key_for("Coke").unwrap(), 2);
        assert_eq!(partition_key_for("Zebra").unwrap(), 25);
        assert_eq!(partition_key_for("zebra").unwrap(), 25);
    }

    #[test]
    fn test_partition_key_rejects_bad_names() {
        assert!(matches!(partition_key_for(""), Err(Error::InvalidInput(_))));
        assert!(matches!(
            partition_key_for("7up"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            partition_key_for("Éclair"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_static_directory() {
        let directory = StaticDirectory::new().with_service(
            "VotingData",
            vec![
                PartitionDescriptor::new(13, 25, "http://b"),
                PartitionDescriptor::new(0, 12, "http://a"),
            ],
        );

        let partitions = directory.enumerate_partitions("VotingData").await.unwrap();
        assert_eq!(partitions[0].address, "http://a");
        assert_eq!(partitions[1].address, "http://b");

        assert_eq!(
            directory.locate("VotingData", 25).await.unwrap().address,
            "http://b"
        );
        assert!(matches!(
            directory.enumerate_partitions("Other").await,
            Err(Error::ServiceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_locate_uncovered_key() {
        let directory = StaticDirectory::new().with_service(
            "VotingData",
            vec![PartitionDescriptor::new(0, 12, "http://a")],
        );
        assert!(matches!(
            directory.locate("VotingData", 20).await,
            Err(Error::PartitionNotFound(20))
        ));
    }
}
