//! Transactional vote counter store for one partition
//!
//! Holds the per-item vote counters and the `TotalBallotsCast` ledger. Every
//! operation runs in its own engine transaction; a failed commit leaves the
//! partition unchanged. Engine failures surface as `StorageUnavailable` and
//! are never retried here.

use crate::common::{validate_name, Error, Result};
use crate::partition::engine::{Table, Txn, TxnEngine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Key of the ballot ledger in the ballots table
pub const BALLOTS_CAST_KEY: &str = "TotalBallotsCast";

/// One vote counter as exposed over the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteCount {
    pub name: String,
    pub count: u64,
}

impl VoteCount {
    pub fn new(name: impl Into<String>, count: u64) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

/// Result of deleting a counter together with its ballot back-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    /// Counter value right before removal
    pub removed: u64,
    /// Amount subtracted from the ballot ledger
    pub backed_out: i64,
    /// Ballot ledger after the back-out
    pub ballots: i64,
}

/// Per-partition counter store over a transactional engine
#[derive(Clone)]
pub struct CounterStore {
    engine: Arc<dyn TxnEngine>,
}

impl CounterStore {
    pub fn new(engine: Arc<dyn TxnEngine>) -> Self {
        Self { engine }
    }

    /// Snapshot of every counter, ordered by name
    pub fn list_all(&self) -> Result<Vec<VoteCount>> {
        let view = self.engine.read_view()?;
        let votes = view
            .scan(Table::Votes)?
            .into_iter()
            .map(|(name, count)| Ok(VoteCount::new(name, to_count(count)?)))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(items = votes.len(), "Listed vote counters");
        Ok(votes)
    }

    /// Current count for `name`, if the counter exists
    pub fn get(&self, name: &str) -> Result<Option<u64>> {
        validate_name(name)?;
        let view = self.engine.read_view()?;
        view.get(Table::Votes, name)?.map(to_count).transpose()
    }

    /// Add one vote for `name`, creating the counter at 1
    pub fn increment(&self, name: &str) -> Result<u64> {
        validate_name(name)?;
        let mut txn = self.engine.begin()?;
        let next = txn.get_for_update(Table::Votes, name)?.unwrap_or(0) + 1;
        txn.put(Table::Votes, name, next)?;
        txn.commit()?;
        tracing::debug!(name, count = next, "Vote recorded");
        to_count(next)
    }

    /// Remove the counter for `name`, returning its last value.
    ///
    /// The ballot ledger is left untouched; see [`CounterStore::remove_vote`].
    pub fn try_delete(&self, name: &str) -> Result<Option<u64>> {
        validate_name(name)?;
        let mut txn = self.engine.begin()?;
        let removed = take_counter(txn.as_mut(), name)?;
        txn.commit()?;
        removed.map(to_count).transpose()
    }

    /// Remove the counter for `name` and back its votes out of the ballot
    /// ledger in the same transaction.
    ///
    /// The back-out is capped at the current ledger value so the ledger never
    /// goes negative, even after a history of partially failed casts.
    pub fn remove_vote(&self, name: &str) -> Result<Removal> {
        validate_name(name)?;
        let mut txn = self.engine.begin()?;
        let Some(removed) = take_counter(txn.as_mut(), name)? else {
            return Err(Error::NotFound(name.to_string()));
        };

        let ballots = txn
            .get_for_update(Table::Ballots, BALLOTS_CAST_KEY)?
            .unwrap_or(0);
        let backed_out = removed.min(ballots.max(0));
        let remaining = ballots - backed_out;
        txn.put(Table::Ballots, BALLOTS_CAST_KEY, remaining)?;
        txn.commit()?;

        tracing::debug!(name, removed, backed_out, ballots = remaining, "Vote item removed");
        Ok(Removal {
            removed: to_count(removed)?,
            backed_out,
            ballots: remaining,
        })
    }

    /// Add `delta` (possibly negative) to the ballot ledger
    pub fn adjust_ballots(&self, delta: i64) -> Result<i64> {
        let mut txn = self.engine.begin()?;
        let current = txn
            .get_for_update(Table::Ballots, BALLOTS_CAST_KEY)?
            .unwrap_or(0);
        let next = current
            .checked_add(delta)
            .ok_or_else(|| Error::InvalidInput(format!("ballot adjustment {} overflows", delta)))?;
        txn.put(Table::Ballots, BALLOTS_CAST_KEY, next)?;
        txn.commit()?;
        tracing::debug!(delta, ballots = next, "Ballot ledger adjusted");
        Ok(next)
    }

    /// Current ballot ledger value (0 when never written)
    pub fn get_ballots(&self) -> Result<i64> {
        let view = self.engine.read_view()?;
        Ok(view.get(Table::Ballots, BALLOTS_CAST_KEY)?.unwrap_or(0))
    }

    /// Ballot ledger and counter sum read from one consistent view
    pub fn totals(&self) -> Result<(i64, i64)> {
        let view = self.engine.read_view()?;
        let ballots = view.get(Table::Ballots, BALLOTS_CAST_KEY)?.unwrap_or(0);
        let votes = view
            .scan(Table::Votes)?
            .into_iter()
            .try_fold(0i64, |acc, (_, count)| acc.checked_add(count))
            .ok_or_else(|| Error::Corrupted("vote counter sum overflows".into()))?;
        Ok((ballots, votes))
    }
}

fn take_counter(txn: &mut (dyn Txn + '_), name: &str) -> Result<Option<i64>> {
    let existing = txn.get_for_update(Table::Votes, name)?;
    if existing.is_some() {
        txn.delete(Table::Votes, name)?;
    }
    Ok(existing)
}

fn to_count(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::Corrupted(format!("negative vote counter {}", value)))
}
