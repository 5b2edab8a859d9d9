use crate::error::StoreError;
use crate::types::{CanonicalRecord, CleanRecord, RawRecord};
use async_trait::async_trait;

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Result of a conditional insert into the canonical table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyPresent,
}

/// Text-typed staging area fed by the raw loader
#[async_trait]
pub trait RawStore: Send + Sync {
    /// Drop whatever is staged and stage `rows` in its place. Returns rows written.
    async fn replace_raw(&self, rows: &[RawRecord]) -> Result<usize, StoreError>;

    /// Staged rows in input order
    async fn load_raw(&self) -> Result<Vec<RawRecord>, StoreError>;
}

/// Append-only destination keyed by `provider_booking_id`
#[async_trait]
pub trait CanonicalStore: Send + Sync {
    /// Create the canonical table if it does not exist yet.
    async fn ensure_canonical(&self) -> Result<(), StoreError>;

    /// Insert `record` unless its key is already present, as one atomic step.
    /// Existing rows are never modified.
    async fn insert_if_absent(&self, record: &CleanRecord) -> Result<InsertOutcome, StoreError>;

    async fn get(&self, provider_booking_id: &str) -> Result<Option<CanonicalRecord>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;

    /// All canonical rows ordered by key
    async fn list(&self) -> Result<Vec<CanonicalRecord>, StoreError>;
}
