use super::{CanonicalStore, InsertOutcome, RawStore};
use crate::error::StoreError;
use crate::types::{CanonicalRecord, CleanRecord, RawRecord};
use async_trait::async_trait;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// In-memory storage implementation for development/testing.
/// Clones share the same underlying tables, like two connections to one database.
#[derive(Clone)]
pub struct InMemoryStore {
    raw: Arc<Mutex<Vec<RawRecord>>>,
    canonical: Arc<Mutex<BTreeMap<String, CanonicalRecord>>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            raw: Arc::new(Mutex::new(Vec::new())),
            canonical: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
}

#[async_trait]
impl RawStore for InMemoryStore {
    async fn replace_raw(&self, rows: &[RawRecord]) -> Result<usize, StoreError> {
        let mut raw = lock(&self.raw)?;
        *raw = rows.to_vec();
        debug!("Staged {} raw rows in memory", raw.len());
        Ok(raw.len())
    }

    async fn load_raw(&self) -> Result<Vec<RawRecord>, StoreError> {
        Ok(lock(&self.raw)?.clone())
    }
}

#[async_trait]
impl CanonicalStore for InMemoryStore {
    async fn ensure_canonical(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_if_absent(&self, record: &CleanRecord) -> Result<InsertOutcome, StoreError> {
        // Check and insert under one guard
        let mut canonical = lock(&self.canonical)?;
        match canonical.entry(record.provider_booking_id.clone()) {
            Entry::Occupied(_) => Ok(InsertOutcome::AlreadyPresent),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn get(&self, provider_booking_id: &str) -> Result<Option<CanonicalRecord>, StoreError> {
        Ok(lock(&self.canonical)?.get(provider_booking_id).cloned())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(lock(&self.canonical)?.len())
    }

    async fn list(&self) -> Result<Vec<CanonicalRecord>, StoreError> {
        Ok(lock(&self.canonical)?.values().cloned().collect())
    }
}
