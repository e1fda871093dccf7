use crate::{
    models::Record,
    query::{Query, Rows},
    schema::Table,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
    #[error("record not found: {table}/{id}")]
    NotFound { table: Table, id: String },
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("backend timed out: {0}")]
    Timeout(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("no active transaction")]
    NoActiveTransaction,
    #[error("a transaction is already open on this thread")]
    TransactionInProgress,
}

impl StorageError {
    pub fn not_found(table: Table, id: &str) -> Self {
        StorageError::NotFound {
            table,
            id: id.to_string(),
        }
    }
}

pub type TransactionId = u64;

/// Statement-execution contract shared by the Local and Remote variants.
///
/// Every mutating call is atomic on its own. Multi-step writes bracket their
/// calls with `begin_transaction`/`commit_transaction` and roll back on error.
/// Transactions do not nest. While one is open, calls from other threads wait
/// until it ends.
pub trait StorageBackend: Send + Sync {
    /// Fails with `ConstraintViolation` on a duplicate primary key or unique key.
    fn insert(&self, table: Table, record: Record) -> Result<Record, StorageError>;

    /// Inserts unless a row with the same primary key exists. Returns whether
    /// a row was written.
    fn insert_if_absent(&self, table: Table, record: Record) -> Result<bool, StorageError>;

    /// Inserts, or overwrites the non-key columns of the existing row.
    fn upsert(&self, table: Table, record: Record) -> Result<Record, StorageError>;

    /// Partial update by primary key. Fails with `NotFound` if no such row.
    fn update(&self, table: Table, id: &str, patch: Record) -> Result<(), StorageError>;

    fn query(&self, query: &Query) -> Result<Rows, StorageError>;

    /// Soft delete on tables with an `is_active` flag, physical removal
    /// otherwise. Fails with `NotFound` if no such row.
    fn delete(&self, table: Table, id: &str) -> Result<(), StorageError>;

    /// Physically removes every row of `table`. Only bulk resets use this.
    fn purge(&self, table: Table) -> Result<u64, StorageError>;

    fn begin_transaction(&self) -> Result<TransactionId, StorageError>;
    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError>;
    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError>;
}
