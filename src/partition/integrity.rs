//! Ballot ledger integrity checking
//!
//! The sum of all vote counters in a partition must equal its ballot ledger
//! whenever no transaction is in flight. A cast is two separate calls (counter
//! increment, then ledger increment), so a failure between them leaves the
//! partition inconsistent. The checker only detects and reports this; it
//! never repairs the ledger.

use crate::common::Result;
use crate::partition::store::CounterStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Source reported with every integrity health report
pub const HEALTH_SOURCE_ID: &str = "ServiceCode";
/// Property reported with every integrity health report
pub const HEALTH_PROPERTY: &str = "StateDictionary";

/// Mismatch between the summed counters and the ballot ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityViolation {
    pub total_votes: i64,
    pub total_ballots: i64,
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total votes across items [{}] does not equal total ballots cast [{}].",
            self.total_votes, self.total_ballots
        )
    }
}

/// Compares the ballot ledger with the sum of all counters
#[derive(Clone)]
pub struct IntegrityChecker {
    store: CounterStore,
}

impl IntegrityChecker {
    pub fn new(store: CounterStore) -> Self {
        Self { store }
    }

    /// `None` when healthy, the discrepancy otherwise
    pub fn check(&self) -> Result<Option<IntegrityViolation>> {
        let (total_ballots, total_votes) = self.store.totals()?;
        if total_ballots == total_votes {
            Ok(None)
        } else {
            Ok(Some(IntegrityViolation {
                total_votes,
                total_ballots,
            }))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    Ok,
    Error,
}

/// Structured health status pushed to the reporting collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub source_id: String,
    pub property: String,
    pub state: HealthState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub reported_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn ok() -> Self {
        Self::new(HealthState::Ok, None)
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self::new(HealthState::Error, Some(description.into()))
    }

    fn new(state: HealthState, description: Option<String>) -> Self {
        Self {
            source_id: HEALTH_SOURCE_ID.to_string(),
            property: HEALTH_PROPERTY.to_string(),
            state,
            description,
            reported_at: Utc::now(),
        }
    }
}

/// Receives health reports from the integrity loop
pub trait HealthReporter: Send + Sync {
    fn report(&self, report: HealthReport);
}

/// Keeps the latest report for the `/health` endpoint and logs transitions
pub struct HealthBoard {
    tx: watch::Sender<HealthReport>,
}

impl HealthBoard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(HealthReport::ok());
        Self { tx }
    }

    pub fn latest(&self) -> HealthReport {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<HealthReport> {
        self.tx.subscribe()
    }
}

impl Default for HealthBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthReporter for HealthBoard {
    fn report(&self, report: HealthReport) {
        let previous = self.tx.borrow().state;
        match (previous, report.state) {
            (_, HealthState::Error) => tracing::error!(
                source = %report.source_id,
                property = %report.property,
                description = report.description.as_deref().unwrap_or_default(),
                "Partition health: Error"
            ),
            (HealthState::Error, HealthState::Ok) => tracing::info!("Partition health restored"),
            (HealthState::Ok, HealthState::Ok) => tracing::trace!("Partition health: Ok"),
        }
        self.tx.send_replace(report);
    }
}

/// Run the integrity check every `interval` until `shutdown` is cancelled.
///
/// Each check runs on the blocking pool so it never stalls request handling,
/// and no transaction is held across the sleep.
pub fn start_integrity_loop(
    checker: IntegrityChecker,
    reporter: Arc<dyn HealthReporter>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while !shutdown.is_cancelled() {
            let task_checker = checker.clone();
            let outcome = tokio::task::spawn_blocking(move || task_checker.check()).await;

            let report = match outcome {
                Ok(Ok(None)) => HealthReport::ok(),
                Ok(Ok(Some(violation))) => HealthReport::error(violation.to_string()),
                Ok(Err(e)) => {
                    tracing::warn!("Integrity check could not run: {}", e);
                    HealthReport::error(format!("Integrity check failed: {}", e))
                }
                Err(e) => HealthReport::error(format!("Integrity check aborted: {}", e)),
            };
            reporter.report(report);

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        tracing::info!("Integrity loop stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::engine::MemEngine;

    fn store() -> CounterStore {
        CounterStore::new(Arc::new(MemEngine::new()))
    }

    #[test]
    fn test_healthy_when_ledger_matches() {
        let store = store();
        for name in ["Coke", "Coke", "Pepsi"] {
            store.increment(name).unwrap();
            store.adjust_ballots(1).unwrap();
        }
        store.remove_vote("Pepsi").unwrap();

        assert_eq!(IntegrityChecker::new(store).check().unwrap(), None);
    }

    #[test]
    fn test_detects_missing_audit() {
        let store = store();
        store.increment("Coke").unwrap();
        store.adjust_ballots(1).unwrap();
        // Counter incremented but the ballot audit never happened
        store.increment("Coke").unwrap();

        let violation = IntegrityChecker::new(store.clone()).check().unwrap().unwrap();
        assert_eq!(
            violation,
            IntegrityViolation {
                total_votes: 2,
                total_ballots: 1
            }
        );
        assert_eq!(
            violation.to_string(),
            "Total votes across items [2] does not equal total ballots cast [1]."
        );

        // Detection only: the ledger is left as is
        assert_eq!(store.get_ballots().unwrap(), 1);
    }

    #[test]
    fn test_health_board_keeps_latest() {
        let board = HealthBoard::new();
        assert_eq!(board.latest().state, HealthState::Ok);

        board.report(HealthReport::error("mismatch"));
        let latest = board.latest();
        assert_eq!(latest.state, HealthState::Error);
        assert_eq!(latest.description.as_deref(), Some("mismatch"));
        assert_eq!(latest.source_id, HEALTH_SOURCE_ID);
        assert_eq!(latest.property, HEALTH_PROPERTY);
    }

    #[tokio::test]
    async fn test_loop_reports_and_stops() {
        let store = store();
        store.increment("Coke").unwrap();

        let board = Arc::new(HealthBoard::new());
        let mut rx = board.subscribe();
        let shutdown = CancellationToken::new();
        let handle = start_integrity_loop(
            IntegrityChecker::new(store),
            board.clone(),
            Duration::from_millis(20),
            shutdown.clone(),
        );

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(board.latest().state, HealthState::Error);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
