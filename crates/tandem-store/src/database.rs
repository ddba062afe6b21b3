//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation. [`Database::transaction`]
//! provides the serializable, conflict-retrying unit of work the workflow
//! engine builds on: any backend offering multi-record transactions with
//! retry-on-conflict semantics could stand in behind the same contract.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use tandem_shared::constants::MAX_TX_RETRIES;

use crate::error::{Result, StoreError};
use crate::migrations;

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a database at an explicit path.
    ///
    /// Parent directories are created as needed. The connection is put into
    /// WAL mode with foreign keys enforced.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// Open an in-memory database. Used by tests and local tooling.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_millis(250))?;

        migrations::run_migrations(&conn)?;

        Ok(Self { conn })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    ///
    /// Callers should prefer the typed CRUD helpers and
    /// [`Database::transaction`]; direct access is for read-only snapshots
    /// and ad-hoc queries.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }

    /// Run `f` inside an immediate (write) transaction.
    ///
    /// The closure receives the open [`Transaction`]; returning `Ok` commits,
    /// returning `Err` rolls back. Busy/locked failures -- SQLite signalling
    /// that a concurrent writer won the race -- restart the whole closure so
    /// it re-reads authoritative state, up to [`MAX_TX_RETRIES`] attempts.
    /// Callers therefore observe either a full commit or a single error,
    /// never a torn write.
    pub fn transaction<T, E: TxError>(
        &mut self,
        mut f: impl FnMut(&Transaction<'_>) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let mut attempts = 0;
        loop {
            let tx = match self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
            {
                Ok(tx) => tx,
                Err(e) if is_busy(&e) => {
                    attempts += 1;
                    if attempts >= MAX_TX_RETRIES {
                        return Err(E::from(StoreError::RetriesExhausted(attempts)));
                    }
                    continue;
                }
                Err(e) => return Err(E::from(StoreError::Sqlite(e))),
            };

            match f(&tx) {
                Ok(value) => match tx.commit() {
                    Ok(()) => return Ok(value),
                    Err(e) if is_busy(&e) => {}
                    Err(e) => return Err(E::from(StoreError::Sqlite(e))),
                },
                Err(e) if e.is_write_conflict() => {}
                Err(e) => return Err(e),
            }

            attempts += 1;
            if attempts >= MAX_TX_RETRIES {
                return Err(E::from(StoreError::RetriesExhausted(attempts)));
            }
            tracing::debug!(attempts, "retrying transaction after write conflict");
        }
    }
}

/// Write-conflict awareness for error types flowing through
/// [`Database::transaction`].
///
/// Domain-level error enums that wrap [`StoreError`] implement this so the
/// retry loop can tell a lost write race apart from a business-rule failure.
pub trait TxError: From<StoreError> {
    /// True when the error means a concurrent writer won the race and the
    /// transaction should be retried.
    fn is_write_conflict(&self) -> bool;
}

impl TxError for StoreError {
    fn is_write_conflict(&self) -> bool {
        matches!(self, StoreError::Sqlite(e) if is_busy(e))
    }
}

fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
    )
}
