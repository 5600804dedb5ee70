//! HTTP client for a single partition's API
//!
//! Transport failures (connect errors, timeouts) are returned as
//! `Err(Error::PartitionUnreachable)`. A partition that answers with a
//! non-success status yields `Ok(Err(Rejection))` so callers can tell a
//! legitimate "not found" apart from an infrastructure fault.

use crate::common::{encode_name, Error, PartitionDescriptor, Result};
use crate::partition::http::PARTITION_KIND;
use crate::partition::VoteCount;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Non-success answer from a partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub body: String,
}

pub type Reply<T> = std::result::Result<T, Rejection>;

/// Where to send a request and which routing key to attach
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTarget {
    pub address: String,
    pub key: i64,
}

impl PartitionTarget {
    pub fn new(descriptor: &PartitionDescriptor, key: i64) -> Self {
        Self {
            address: descriptor.address.trim_end_matches('/').to_string(),
            key,
        }
    }

    /// Target a partition as a whole, addressed by its low key
    pub fn partition(descriptor: &PartitionDescriptor) -> Self {
        Self::new(descriptor, descriptor.low_key)
    }
}

#[derive(Debug, Clone)]
pub struct PartitionClient {
    http: reqwest::Client,
}

impl PartitionClient {
    /// Every call is bounded by `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self { http })
    }

    pub async fn list_votes(&self, target: &PartitionTarget) -> Result<Reply<Vec<VoteCount>>> {
        let request = self.http.get(format!("{}/votes", target.address));
        self.send_json(target, request).await
    }

    pub async fn get_ballots(&self, target: &PartitionTarget) -> Result<Reply<i64>> {
        let request = self.http.get(format!("{}/votes/ballots", target.address));
        match self.send(target, request).await? {
            Ok(body) => body.trim().parse::<i64>().map(Ok).map_err(|e| {
                Error::Http(format!(
                    "partition {} returned malformed ballot total: {}",
                    target.key, e
                ))
            }),
            Err(rejection) => Ok(Err(rejection)),
        }
    }

    pub async fn get_vote(&self, target: &PartitionTarget, name: &str) -> Result<Reply<VoteCount>> {
        let request = self
            .http
            .get(format!("{}/votes/{}", target.address, encode_name(name)));
        self.send_json(target, request).await
    }

    /// Increment the counter for `name`
    pub async fn put_vote(&self, target: &PartitionTarget, name: &str) -> Result<Reply<()>> {
        let request = self
            .http
            .put(format!("{}/votes/{}", target.address, encode_name(name)));
        Ok(self.send(target, request).await?.map(|_| ()))
    }

    /// Add one ballot to the partition's ledger
    pub async fn audit_ballot(&self, target: &PartitionTarget) -> Result<Reply<()>> {
        let request = self.http.post(format!("{}/votes", target.address));
        Ok(self.send(target, request).await?.map(|_| ()))
    }

    /// Record a vote, then audit the ballot if and only if the vote succeeded.
    ///
    /// The two steps are separate transactions on the partition. If the audit
    /// fails after the vote was recorded the partition stays inconsistent
    /// until the integrity check reports it; no compensation is attempted.
    pub async fn cast_vote(&self, target: &PartitionTarget, name: &str) -> Result<Reply<()>> {
        if let Err(rejection) = self.put_vote(target, name).await? {
            return Ok(Err(rejection));
        }

        let audit = self.audit_ballot(target).await;
        match &audit {
            Ok(Ok(())) => {}
            Ok(Err(rejection)) => tracing::warn!(
                name,
                partition = target.key,
                status = %rejection.status,
                "Vote recorded but ballot audit was rejected"
            ),
            Err(e) => tracing::warn!(
                name,
                partition = target.key,
                "Vote recorded but ballot audit failed: {}",
                e
            ),
        }
        audit
    }

    /// Delete the counter for `name`; a missing counter is a 404 rejection
    pub async fn delete_vote(&self, target: &PartitionTarget, name: &str) -> Result<Reply<()>> {
        let request = self
            .http
            .delete(format!("{}/votes/{}", target.address, encode_name(name)));
        Ok(self.send(target, request).await?.map(|_| ()))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        target: &PartitionTarget,
        request: RequestBuilder,
    ) -> Result<Reply<T>> {
        match self.send(target, request).await? {
            Ok(body) => serde_json::from_str(&body).map(Ok).map_err(|e| {
                Error::Http(format!(
                    "partition {} returned malformed JSON: {}",
                    target.key, e
                ))
            }),
            Err(rejection) => Ok(Err(rejection)),
        }
    }

    async fn send(&self, target: &PartitionTarget, request: RequestBuilder) -> Result<Reply<String>> {
        let response = request
            .query(&[
                ("PartitionKey", target.key.to_string()),
                ("PartitionKind", PARTITION_KIND.to_string()),
            ])
            .send()
            .await
            .map_err(|e| unreachable(target, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| unreachable(target, e))?;

        if status.is_success() {
            Ok(Ok(body))
        } else {
            tracing::debug!(partition = target.key, %status, "Partition rejected request");
            Ok(Err(Rejection { status, body }))
        }
    }
}

fn unreachable(target: &PartitionTarget, e: reqwest::Error) -> Error {
    let reason = if e.is_timeout() {
        format!("timed out: {}", e)
    } else {
        e.to_string()
    };
    Error::PartitionUnreachable {
        partition: target.key,
        reason,
    }
}
