use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::record::LedgerRecord;

/// Keyed persistence for one ledger record type.
///
/// Only the access patterns the ledgers need: lookup by id or unique key,
/// insert, replace, and "oldest N in a status".
#[async_trait]
pub trait RecordStore<R: LedgerRecord>: Send + Sync {
    /// Insert a new record. Fails with `AlreadyExists` if its key is taken.
    async fn insert(&self, record: R) -> Result<(), LedgerError>;

    /// Replace an existing record.
    async fn update(&self, record: R) -> Result<(), LedgerError>;

    async fn get(&self, id: Uuid) -> Result<Option<R>, LedgerError>;

    async fn find_by_key(&self, key: &R::Key) -> Result<Option<R>, LedgerError>;

    /// Up to `limit` records in `status`, least recently modified first,
    /// skipping the ids in `exclude`.
    async fn query_by_status(
        &self,
        status: R::Status,
        limit: usize,
        exclude: &HashSet<Uuid>,
    ) -> Result<Vec<R>, LedgerError>;

    /// Total number of records.
    async fn count(&self) -> Result<usize, LedgerError>;
}

/// In-process record store.
pub struct MemoryStore<R: LedgerRecord> {
    records: DashMap<Uuid, R>,
    /// Unique key -> record id.
    keys: DashMap<R::Key, Uuid>,
}

impl<R: LedgerRecord> MemoryStore<R> {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            keys: DashMap::new(),
        }
    }
}

impl<R: LedgerRecord> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: LedgerRecord> RecordStore<R> for MemoryStore<R> {
    async fn insert(&self, record: R) -> Result<(), LedgerError> {
        let key = record.key();
        match self.keys.entry(key.clone()) {
            Entry::Occupied(_) => Err(LedgerError::AlreadyExists(key.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(record.id());
                self.records.insert(record.id(), record);
                Ok(())
            }
        }
    }

    async fn update(&self, record: R) -> Result<(), LedgerError> {
        let mut existing = self
            .records
            .get_mut(&record.id())
            .ok_or_else(|| LedgerError::NotFound(record.id().to_string()))?;
        if existing.value().key() != record.key() {
            return Err(LedgerError::InvalidUpdate(format!(
                "record {} cannot change its key from {} to {}",
                record.id(),
                existing.value().key(),
                record.key()
            )));
        }
        *existing = record;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<R>, LedgerError> {
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn find_by_key(&self, key: &R::Key) -> Result<Option<R>, LedgerError> {
        let id = match self.keys.get(key) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn query_by_status(
        &self,
        status: R::Status,
        limit: usize,
        exclude: &HashSet<Uuid>,
    ) -> Result<Vec<R>, LedgerError> {
        let mut matching: Vec<R> = self
            .records
            .iter()
            .filter(|r| r.status() == status && !exclude.contains(&r.id()))
            .map(|r| r.value().clone())
            .collect();
        matching.sort_by_key(|r| (r.last_modified(), r.id()));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn count(&self) -> Result<usize, LedgerError> {
        Ok(self.records.len())
    }
}
