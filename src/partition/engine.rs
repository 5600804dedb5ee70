//! Transactional key-value engines backing a partition
//!
//! A partition keeps two tables: per-item vote counters and the ballot ledger.
//! Engines provide read-write transactions with per-key pessimistic locking
//! (`get_for_update`) and consistent read views. Dropping a transaction
//! without committing discards its writes.
//!
//! - [`MemEngine`]: in-memory, serializes transactions behind one mutex
//! - [`RocksEngine`]: RocksDB `TransactionDB` with one column family per table

use crate::common::{Error, Result};
use rocksdb::{
    ColumnFamily, IteratorMode, Options, SnapshotWithThreadMode, Transaction, TransactionDB,
    TransactionDBOptions,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const CF_VOTES: &str = "votes";
const CF_BALLOTS: &str = "ballots";

/// Logical tables of a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    Votes,
    Ballots,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Votes => CF_VOTES,
            Table::Ballots => CF_BALLOTS,
        }
    }
}

/// A consistent point-in-time view over both tables
pub trait ReadView {
    fn get(&self, table: Table, key: &str) -> Result<Option<i64>>;

    /// All entries of `table`, ordered by key
    fn scan(&self, table: Table) -> Result<Vec<(String, i64)>>;
}

/// A read-write transaction. Writes become visible only on `commit`.
pub trait Txn {
    /// Read `key` and lock it until the transaction ends
    fn get_for_update(&mut self, table: Table, key: &str) -> Result<Option<i64>>;

    fn put(&mut self, table: Table, key: &str, value: i64) -> Result<()>;

    fn delete(&mut self, table: Table, key: &str) -> Result<()>;

    fn commit(self: Box<Self>) -> Result<()>;
}

/// Engine that hands out transactions and read views
pub trait TxnEngine: Send + Sync {
    fn begin(&self) -> Result<Box<dyn Txn + '_>>;

    fn read_view(&self) -> Result<Box<dyn ReadView + '_>>;
}

fn decode_value(bytes: &[u8]) -> Result<i64> {
    <[u8; 8]>::try_from(bytes)
        .map(i64::from_be_bytes)
        .map_err(|_| Error::Corrupted(format!("counter value has {} bytes", bytes.len())))
}

fn decode_key(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| Error::Corrupted("counter key is not valid UTF-8".into()))
}

// === In-memory engine ===

#[derive(Debug, Default)]
struct Tables {
    votes: BTreeMap<String, i64>,
    ballots: BTreeMap<String, i64>,
}

impl Tables {
    fn table(&self, table: Table) -> &BTreeMap<String, i64> {
        match table {
            Table::Votes => &self.votes,
            Table::Ballots => &self.ballots,
        }
    }

    fn table_mut(&mut self, table: Table) -> &mut BTreeMap<String, i64> {
        match table {
            Table::Votes => &mut self.votes,
            Table::Ballots => &mut self.ballots,
        }
    }
}

/// In-memory engine (default when no data path is configured)
#[derive(Debug, Default)]
pub struct MemEngine {
    tables: Mutex<Tables>,
    offline: AtomicBool,
}

impl MemEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent transaction fail with `StorageUnavailable`
    /// (fault injection for tests and drills).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::StorageUnavailable("in-memory engine is offline".into()));
        }
        self.tables
            .lock()
            .map_err(|_| Error::StorageUnavailable("in-memory engine lock poisoned".into()))
    }
}

impl TxnEngine for MemEngine {
    fn begin(&self) -> Result<Box<dyn Txn + '_>> {
        Ok(Box::new(MemTxn {
            guard: self.lock()?,
            pending: Vec::new(),
        }))
    }

    fn read_view(&self) -> Result<Box<dyn ReadView + '_>> {
        Ok(Box::new(MemView { guard: self.lock()? }))
    }
}

struct MemTxn<'a> {
    guard: MutexGuard<'a, Tables>,
    pending: Vec<(Table, String, Option<i64>)>,
}

impl Txn for MemTxn<'_> {
    fn get_for_update(&mut self, table: Table, key: &str) -> Result<Option<i64>> {
        let staged = self
            .pending
            .iter()
            .rev()
            .find(|(t, k, _)| *t == table && k == key);
        match staged {
            Some((_, _, value)) => Ok(*value),
            None => Ok(self.guard.table(table).get(key).copied()),
        }
    }

    fn put(&mut self, table: Table, key: &str, value: i64) -> Result<()> {
        self.pending.push((table, key.to_string(), Some(value)));
        Ok(())
    }

    fn delete(&mut self, table: Table, key: &str) -> Result<()> {
        self.pending.push((table, key.to_string(), None));
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let MemTxn { mut guard, pending } = *self;
        for (table, key, value) in pending {
            match value {
                Some(value) => {
                    guard.table_mut(table).insert(key, value);
                }
                None => {
                    guard.table_mut(table).remove(&key);
                }
            }
        }
        Ok(())
    }
}

struct MemView<'a> {
    guard: MutexGuard<'a, Tables>,
}

impl ReadView for MemView<'_> {
    fn get(&self, table: Table, key: &str) -> Result<Option<i64>> {
        Ok(self.guard.table(table).get(key).copied())
    }

    fn scan(&self, table: Table) -> Result<Vec<(String, i64)>> {
        Ok(self
            .guard
            .table(table)
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect())
    }
}

// === RocksDB engine ===

/// Durable engine on RocksDB `TransactionDB` (pessimistic locking)
pub struct RocksEngine {
    db: TransactionDB,
}

impl RocksEngine {
    /// Open or create the engine at `path`
    pub fn open(path: impl AsRef<Path>, lock_timeout: Duration) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        // Negative timeouts mean "wait forever" to RocksDB
        let lock_timeout_ms = i64::try_from(lock_timeout.as_millis())
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or_else(|| {
                Error::InvalidConfig(format!("invalid lock timeout {:?}", lock_timeout))
            })?;

        let mut txn_db_opts = TransactionDBOptions::default();
        txn_db_opts.set_txn_lock_timeout(lock_timeout_ms);

        let db = TransactionDB::open_cf(&opts, &txn_db_opts, path, [CF_VOTES, CF_BALLOTS])?;

        Ok(Self { db })
    }

    fn cf(&self, table: Table) -> Result<&ColumnFamily> {
        self.db.cf_handle(table.name()).ok_or_else(|| {
            Error::StorageUnavailable(format!("missing column family {}", table.name()))
        })
    }
}

impl TxnEngine for RocksEngine {
    fn begin(&self) -> Result<Box<dyn Txn + '_>> {
        Ok(Box::new(RocksTxn {
            engine: self,
            txn: self.db.transaction(),
        }))
    }

    fn read_view(&self) -> Result<Box<dyn ReadView + '_>> {
        Ok(Box::new(RocksView {
            engine: self,
            snapshot: self.db.snapshot(),
        }))
    }
}

struct RocksTxn<'a> {
    engine: &'a RocksEngine,
    txn: Transaction<'a, TransactionDB>,
}

impl Txn for RocksTxn<'_> {
    fn get_for_update(&mut self, table: Table, key: &str) -> Result<Option<i64>> {
        let cf = self.engine.cf(table)?;
        match self.txn.get_for_update_cf(cf, key.as_bytes(), true)? {
            Some(bytes) => Ok(Some(decode_value(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&mut self, table: Table, key: &str, value: i64) -> Result<()> {
        let cf = self.engine.cf(table)?;
        self.txn.put_cf(cf, key.as_bytes(), value.to_be_bytes())?;
        Ok(())
    }

    fn delete(&mut self, table: Table, key: &str) -> Result<()> {
        let cf = self.engine.cf(table)?;
        self.txn.delete_cf(cf, key.as_bytes())?;
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        self.txn.commit()?;
        Ok(())
    }
}

struct RocksView<'a> {
    engine: &'a RocksEngine,
    snapshot: SnapshotWithThreadMode<'a, TransactionDB>,
}

impl ReadView for RocksView<'_> {
    fn get(&self, table: Table, key: &str) -> Result<Option<i64>> {
        let cf = self.engine.cf(table)?;
        match self.snapshot.get_cf(cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(decode_value(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan(&self, table: Table) -> Result<Vec<(String, i64)>> {
        let cf = self.engine.cf(table)?;
        let mut entries = Vec::new();
        for item in self.snapshot.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            entries.push((decode_key(&key)?, decode_value(&value)?));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exercise_engine(engine: &dyn TxnEngine) {
        let mut txn = engine.begin().unwrap();
        txn.put(Table::Votes, "Coke", 2).unwrap();
        txn.put(Table::Ballots, "TotalBallotsCast", 2).unwrap();
        assert_eq!(txn.get_for_update(Table::Votes, "Coke").unwrap(), Some(2));
        txn.commit().unwrap();

        let view = engine.read_view().unwrap();
        assert_eq!(view.get(Table::Votes, "Coke").unwrap(), Some(2));
        assert_eq!(
            view.scan(Table::Votes).unwrap(),
            vec![("Coke".to_string(), 2)]
        );
        drop(view);

        // Uncommitted writes are discarded on drop
        {
            let mut txn = engine.begin().unwrap();
            txn.put(Table::Votes, "Pepsi", 1).unwrap();
            txn.delete(Table::Votes, "Coke").unwrap();
        }
        let view = engine.read_view().unwrap();
        assert_eq!(view.get(Table::Votes, "Pepsi").unwrap(), None);
        assert_eq!(view.get(Table::Votes, "Coke").unwrap(), Some(2));
    }

    #[test]
    fn test_mem_engine() {
        exercise_engine(&MemEngine::new());
    }

    #[test]
    fn test_rocks_engine() {
        let dir = tempdir().unwrap();
        let engine = RocksEngine::open(dir.path().join("partition.db"), Duration::from_secs(1))
            .unwrap();
        exercise_engine(&engine);
    }

    #[test]
    fn test_rocks_engine_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partition.db");
        {
            let engine = RocksEngine::open(&path, Duration::from_secs(1)).unwrap();
            let mut txn = engine.begin().unwrap();
            txn.put(Table::Votes, "Coke", 7).unwrap();
            txn.commit().unwrap();
        }
        let engine = RocksEngine::open(&path, Duration::from_secs(1)).unwrap();
        let view = engine.read_view().unwrap();
        assert_eq!(view.get(Table::Votes, "Coke").unwrap(), Some(7));
    }

    #[test]
    fn test_rocks_engine_rejects_unbounded_lock_timeout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partition.db");
        assert!(matches!(
            RocksEngine::open(&path, Duration::ZERO).err(),
            Some(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            RocksEngine::open(&path, Duration::from_millis(u64::MAX)).err(),
            Some(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_offline_engine() {
        let engine = MemEngine::new();
        engine.set_offline(true);
        assert!(matches!(
            engine.begin().err(),
            Some(Error::StorageUnavailable(_))
        ));
        engine.set_offline(false);
        assert!(engine.begin().is_ok());
    }
}
