//! Cross-partition aggregation and vote routing
//!
//! Reads fan out to every partition concurrently and merge whatever comes
//! back; a slow or failed partition is skipped rather than failing the whole
//! tally. Writes go to the single partition owning the item's key and fail
//! loudly when that partition cannot be reached.

use crate::common::{validate_name, Error, PartitionDescriptor, Result};
use crate::partition::VoteCount;
use crate::web::locator::{partition_key_for, PartitionDirectory};
use crate::web::partition_client::{PartitionClient, PartitionTarget, Reply};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Votes and ballot totals merged across partitions.
///
/// `votes` is the concatenation of each partition's counters in no particular
/// order; partitions own disjoint names so nothing is merged by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalTally {
    pub votes: Vec<VoteCount>,
    pub total_ballots: i64,
}

/// What one partition contributed to a tally
struct PartitionSlice {
    partition: i64,
    votes: Vec<VoteCount>,
    ballots: i64,
}

pub struct Aggregator {
    directory: Arc<dyn PartitionDirectory>,
    client: PartitionClient,
    service: String,
}

impl Aggregator {
    pub fn new(
        directory: Arc<dyn PartitionDirectory>,
        client: PartitionClient,
        service: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            client,
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Query every partition concurrently and merge the results.
    ///
    /// Fails only when partitions exist and none of them answered. Dropping
    /// the returned future abandons all in-flight partition calls.
    pub async fn get_global_tally(&self) -> Result<GlobalTally> {
        let partitions = self.directory.enumerate_partitions(&self.service).await?;

        let slices = join_all(partitions.iter().map(|p| self.query_partition(p))).await;

        let mut tally = GlobalTally::default();
        let mut answered = 0;
        for slice in slices.into_iter().flatten() {
            answered += 1;
            tally.votes.extend(slice.votes);
            tally.total_ballots = match tally.total_ballots.checked_add(slice.ballots) {
                Some(total) => total,
                None => {
                    tracing::warn!(
                        partition = slice.partition,
                        ballots = slice.ballots,
                        "Ballot total overflows, saturating"
                    );
                    tally.total_ballots.saturating_add(slice.ballots)
                }
            };
        }

        if answered == 0 && !partitions.is_empty() {
            return Err(Error::AllPartitionsUnreachable(partitions.len()));
        }

        tracing::debug!(
            partitions = partitions.len(),
            answered,
            items = tally.votes.len(),
            total_ballots = tally.total_ballots,
            "Global tally computed"
        );
        Ok(tally)
    }

    /// Route a vote for `name` to its partition and cast it there
    pub async fn cast_vote(&self, name: &str) -> Result<Reply<()>> {
        let target = self.route(name).await?;
        self.client.cast_vote(&target, name).await
    }

    /// Route a delete for `name` to its partition. The partition backs the
    /// deleted votes out of its ballot ledger in the same transaction.
    pub async fn delete_vote(&self, name: &str) -> Result<Reply<()>> {
        let target = self.route(name).await?;
        self.client.delete_vote(&target, name).await
    }

    async fn route(&self, name: &str) -> Result<PartitionTarget> {
        validate_name(name)?;
        let key = partition_key_for(name)?;
        let descriptor = self.directory.locate(&self.service, key).await?;
        Ok(PartitionTarget::new(&descriptor, key))
    }

    async fn query_partition(&self, descriptor: &PartitionDescriptor) -> Option<PartitionSlice> {
        let target = PartitionTarget::partition(descriptor);
        let (votes, ballots) = tokio::join!(
            self.client.list_votes(&target),
            self.client.get_ballots(&target)
        );

        let votes = match votes {
            Ok(Ok(votes)) => votes,
            Ok(Err(rejection)) => {
                tracing::warn!(
                    partition = target.key,
                    status = %rejection.status,
                    "Skipping partition: vote listing rejected"
                );
                return None;
            }
            Err(e) => {
                tracing::warn!(partition = target.key, "Skipping partition: {}", e);
                return None;
            }
        };

        let ballots = match ballots {
            Ok(Ok(ballots)) => ballots,
            Ok(Err(rejection)) => {
                tracing::warn!(
                    partition = target.key,
                    status = %rejection.status,
                    "Ballot total rejected; counting 0 ballots"
                );
                0
            }
            Err(e) => {
                tracing::warn!(
                    partition = target.key,
                    "Ballot total unavailable; counting 0 ballots: {}",
                    e
                );
                0
            }
        };

        Some(PartitionSlice {
            partition: target.key,
            votes,
            ballots,
        })
    }
}
