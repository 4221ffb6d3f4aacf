//! Storage traits and error types
//!
//! This module defines the trait interface for listing stores and the tagged
//! outcome of a single `persist` call.

use crate::storage::{ListingRecord, StoreStats};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while opening or querying a store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Why a single insert did not produce a new row
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistError {
    /// The URL is already stored
    #[error("duplicate listing url")]
    DuplicateKey,

    /// The database could not be reached
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("{0}")]
    Other(String),
}

/// Result of persisting one listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// A new row was written
    Inserted,

    /// The URL was already present; nothing was written
    ///
    /// A duplicate key is the only reason a persist is skipped, so the variant
    /// carries no payload. A unique-constraint error and an ignored insert
    /// both land here.
    Skipped,

    /// The row could not be written
    Failed(PersistError),
}

impl PersistOutcome {
    /// Folds a low-level insert result into an outcome
    ///
    /// `Ok(n)` is the number of changed rows: with insert-or-ignore semantics a
    /// zero means the key already existed.
    pub fn from_insert(result: Result<usize, PersistError>) -> Self {
        match result {
            Ok(0) | Err(PersistError::DuplicateKey) => Self::Skipped,
            Ok(_) => Self::Inserted,
            Err(e) => Self::Failed(e),
        }
    }
}

/// Trait for listing store implementations
///
/// Implementations are shared by every detail worker of a run, so all methods
/// take `&self`; a store handles its own connection pooling.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Inserts a record unless its URL is already stored
    ///
    /// Never fails as a whole: every problem is reported through
    /// `PersistOutcome::Failed` so callers can count it and move on.
    async fn persist(&self, record: &ListingRecord) -> PersistOutcome;

    /// Looks up a stored record by URL
    async fn find_by_url(&self, url: &str) -> StorageResult<Option<ListingRecord>>;

    /// Aggregate counts over the stored listings
    async fn stats(&self) -> StorageResult<StoreStats>;
}
