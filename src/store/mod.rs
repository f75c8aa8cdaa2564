//! Relational store
//!
//! A sled database holding every table of the profile store in one `tables`
//! tree (tagged by table) plus a `meta` tree for the schema version. Reads go
//! straight to sled. Writes are serialised by a process-wide lock and applied
//! in sled transactions, so a dedup or replace write racing an identical one
//! leaves exactly one row behind.
//!
//! Session-owned tables can only be written through [`Writer::session_tx`],
//! which marks the owning session dirty in the same transaction. There is no
//! other write path to those tables.

pub mod schema;
pub mod upgrade;

use crate::error::StorageError;
use crate::types::SessionId;
use parking_lot::{Mutex, MutexGuard};
use schema::{Owner, SessionRecord, Table};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::{Db, Tree};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const TREE_TABLES: &str = "tables";
const TREE_META: &str = "meta";

/// Result type inside a sled transaction closure.
pub(crate) type TxResult<T> = Result<T, ConflictableTransactionError<StorageError>>;

/// File-backed profile store.
pub struct Store {
    db: Db,
    tables: Tree,
    meta: Tree,
    write_lock: Mutex<()>,
}

impl Store {
    /// Open (or create) a store at `path` and bring its schema up to date.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            StorageError::IoError(io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        Self::from_db(db)
    }

    /// In-memory store that disappears on drop.
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(to_storage_io)?;
        Self::from_db(db)
    }

    pub fn shared<P: AsRef<Path>>(path: P) -> Result<Arc<Self>, StorageError> {
        Ok(Arc::new(Self::open(path)?))
    }

    fn from_db(db: Db) -> Result<Self, StorageError> {
        let tables = db.open_tree(TREE_TABLES).map_err(to_storage_io)?;
        let meta = db.open_tree(TREE_META).map_err(to_storage_io)?;
        let store = Self {
            db,
            tables,
            meta,
            write_lock: Mutex::new(()),
        };
        let version = upgrade::ensure_schema(&store)?;
        debug!(schema_version = version, "Store opened");
        Ok(store)
    }

    pub(crate) fn meta(&self) -> &Tree {
        &self.meta
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Take the write lock. Held for the whole read-check-write sequence of
    /// an operation.
    pub(crate) fn writer(&self) -> Writer<'_> {
        Writer {
            store: self,
            _guard: self.write_lock.lock(),
        }
    }

    pub(crate) fn get<T: DeserializeOwned>(
        &self,
        table: Table,
        key: &[u8],
    ) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.tables.get(table.key(key)).map_err(to_storage_io)? else {
            return Ok(None);
        };
        Ok(Some(decode(table, &raw)?))
    }

    pub(crate) fn contains(&self, table: Table, key: &[u8]) -> Result<bool, StorageError> {
        self.tables
            .contains_key(table.key(key))
            .map_err(to_storage_io)
    }

    /// Rows whose key starts with `prefix`, in key order.
    pub(crate) fn scan<T: DeserializeOwned>(
        &self,
        table: Table,
        prefix: &[u8],
    ) -> Result<Vec<T>, StorageError> {
        Ok(self
            .scan_entries(table, prefix)?
            .into_iter()
            .map(|(_, row)| row)
            .collect())
    }

    /// Like [`Store::scan`] but also returns each key (without the table tag).
    pub(crate) fn scan_entries<T: DeserializeOwned>(
        &self,
        table: Table,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, T)>, StorageError> {
        let mut out = Vec::new();
        for item in self.tables.scan_prefix(table.key(prefix)) {
            let (key, value) = item.map_err(to_storage_io)?;
            out.push((key[1..].to_vec(), decode(table, &value)?));
        }
        Ok(out)
    }

    pub(crate) fn scan_keys(&self, table: Table, prefix: &[u8]) -> Result<Vec<Vec<u8>>, StorageError> {
        let mut out = Vec::new();
        for item in self.tables.scan_prefix(table.key(prefix)) {
            let (key, _) = item.map_err(to_storage_io)?;
            out.push(key[1..].to_vec());
        }
        Ok(out)
    }

    pub(crate) fn count(&self, table: Table, prefix: &[u8]) -> Result<usize, StorageError> {
        let mut n = 0usize;
        for item in self.tables.scan_prefix(table.key(prefix)) {
            item.map_err(to_storage_io)?;
            n += 1;
        }
        Ok(n)
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(to_storage_io)?;
        Ok(())
    }
}

/// Holder of the store write lock.
pub(crate) struct Writer<'a> {
    store: &'a Store,
    _guard: MutexGuard<'a, ()>,
}

impl<'a> Writer<'a> {
    pub fn store(&self) -> &'a Store {
        self.store
    }

    /// Fresh row id. Ids start at 1 and are never reused.
    pub fn next_id(&self) -> Result<u64, StorageError> {
        Ok(self.store.db.generate_id().map_err(to_storage_io)? + 1)
    }

    /// Transaction over global (non-session) tables.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: Fn(&Tx<'_>) -> TxResult<T>,
    {
        self.store
            .tables
            .transaction(|tree| {
                let tx = Tx {
                    tree,
                    scope: Scope::Global,
                };
                f(&tx)
            })
            .map_err(from_tx_error)
    }

    /// Transaction over the tables owned by `session`. The session is marked
    /// dirty when the closure succeeds; a missing session is a constraint
    /// violation.
    pub fn session_tx<T, F>(&self, session: SessionId, f: F) -> Result<T, StorageError>
    where
        F: Fn(&Tx<'_>) -> TxResult<T>,
    {
        self.store
            .tables
            .transaction(|tree| {
                let key = session.to_key();
                let raw = tree.get(schema::SESSIONS.key(&key))?;
                let Some(raw) = raw else {
                    return Err(ConflictableTransactionError::Abort(StorageError::constraint(
                        schema::SESSIONS.name,
                        format!("session {} does not exist", session),
                    )));
                };
                let mut record: SessionRecord =
                    decode(schema::SESSIONS, &raw).map_err(ConflictableTransactionError::Abort)?;

                let tx = Tx {
                    tree,
                    scope: Scope::Session,
                };
                let out = f(&tx)?;

                if !record.dirty {
                    record.dirty = true;
                    let bytes = encode(schema::SESSIONS, &record)
                        .map_err(ConflictableTransactionError::Abort)?;
                    tree.insert(schema::SESSIONS.key(&key), bytes)?;
                }
                Ok(out)
            })
            .map_err(from_tx_error)
    }

    /// Transaction allowed to touch every table. Only session teardown and
    /// schema upgrades use it.
    pub(crate) fn unrestricted_tx<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: Fn(&Tx<'_>) -> TxResult<T>,
    {
        self.store
            .tables
            .transaction(|tree| {
                let tx = Tx {
                    tree,
                    scope: Scope::Unrestricted,
                };
                f(&tx)
            })
            .map_err(from_tx_error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Global,
    Session,
    Unrestricted,
}

/// Typed view over a transaction on the `tables` tree.
pub(crate) struct Tx<'t> {
    tree: &'t TransactionalTree,
    scope: Scope,
}

impl Tx<'_> {
    pub fn get<T: DeserializeOwned>(&self, table: Table, key: &[u8]) -> TxResult<Option<T>> {
        match self.tree.get(table.key(key))? {
            Some(raw) => Ok(Some(
                decode(table, &raw).map_err(ConflictableTransactionError::Abort)?,
            )),
            None => Ok(None),
        }
    }

    pub fn put<T: Serialize>(&self, table: Table, key: &[u8], value: &T) -> TxResult<()> {
        self.check_scope(table)?;
        let bytes = encode(table, value).map_err(ConflictableTransactionError::Abort)?;
        self.tree.insert(table.key(key), bytes)?;
        Ok(())
    }

    /// Returns whether a row was removed.
    pub fn remove(&self, table: Table, key: &[u8]) -> TxResult<bool> {
        self.check_scope(table)?;
        Ok(self.tree.remove(table.key(key))?.is_some())
    }

    fn check_scope(&self, table: Table) -> TxResult<()> {
        let allowed = match (self.scope, table.owner) {
            (Scope::Unrestricted, _) => true,
            (Scope::Global, Owner::Global) => true,
            (Scope::Session, Owner::Session) => true,
            _ => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(ConflictableTransactionError::Abort(StorageError::constraint(
                table.name,
                "write outside of the owning transaction scope",
            )))
        }
    }
}

pub(crate) fn abort<T>(err: StorageError) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err))
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn encode<T: Serialize>(table: Table, value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value).map_err(|e| {
        StorageError::InvalidData(format!("Failed to encode {} row: {}", table.name, e))
    })
}

fn decode<T: DeserializeOwned>(table: Table, raw: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(raw).map_err(|e| {
        StorageError::InvalidData(format!("Failed to decode {} row: {}", table.name, e))
    })
}

pub(crate) fn to_storage_io(err: sled::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::Other, err.to_string()))
}

fn from_tx_error(err: TransactionError<StorageError>) -> StorageError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => to_storage_io(e),
    }
}
