//! RocksDB storage backend for the YoID node.
//!
//! Each ledger gets a record column family (id -> JSON record) and a key
//! index (business key -> id). Directory collections are keyed by entity id.

use anyhow::Result;
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use yoid_core::{ActivityCompletion, Opportunity, Organization, User};
use yoid_ledger::{
    CredentialIssuanceRecord, LedgerError, LedgerRecord, RecordStore, TenantProvisioningRecord,
};
use yoid_pipeline::{DomainDirectory, PipelineError};

/// Column family names for different data types.
const CF_TENANT_RECORDS: &str = "tenant_records";
const CF_TENANT_KEYS: &str = "tenant_keys";
const CF_ISSUANCE_RECORDS: &str = "issuance_records";
const CF_ISSUANCE_KEYS: &str = "issuance_keys";
const CF_USERS: &str = "users";
const CF_ORGANIZATIONS: &str = "organizations";
const CF_OPPORTUNITIES: &str = "opportunities";
const CF_COMPLETIONS: &str = "activity_completions";

const COLUMN_FAMILIES: [&str; 8] = [
    CF_TENANT_RECORDS,
    CF_TENANT_KEYS,
    CF_ISSUANCE_RECORDS,
    CF_ISSUANCE_KEYS,
    CF_USERS,
    CF_ORGANIZATIONS,
    CF_OPPORTUNITIES,
    CF_COMPLETIONS,
];

/// RocksDB-backed storage for the YoID node.
pub struct Storage {
    db: DB,
    /// Serialises key-index check-and-write sequences.
    write_lock: Mutex<()>,
}

impl Storage {
    /// Open or create a RocksDB database at the given path with column families.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn cf(&self, cf_name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(cf_name)
            .ok_or_else(|| anyhow::anyhow!("column family '{}' not found", cf_name))
    }

    /// Put a value into a column family.
    pub fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(cf, key, value)?;
        Ok(())
    }

    /// Get a value from a column family.
    pub fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        let value = self.db.get_cf(cf, key)?;
        Ok(value)
    }

    pub fn put_json<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put(cf_name, key, &bytes)
    }

    pub fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        match self.get(cf_name, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Decode every value of a column family.
    pub fn scan_json<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, bytes) = item?;
            values.push(serde_json::from_slice(&bytes)?);
        }
        Ok(values)
    }

    /// Number of entries in a column family.
    pub fn count(&self, cf_name: &str) -> Result<usize> {
        let cf = self.cf(cf_name)?;
        let mut count = 0;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Write a record and its key-index entry atomically.
    fn write_indexed(
        &self,
        records_cf: &str,
        keys_cf: &str,
        id: Uuid,
        key: &str,
        record: &[u8],
    ) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(records_cf)?, id.as_bytes(), record);
        batch.put_cf(self.cf(keys_cf)?, key.as_bytes(), id.as_bytes());
        self.db.write(batch)?;
        Ok(())
    }
}

fn storage_error(e: anyhow::Error) -> LedgerError {
    LedgerError::Storage(e.to_string())
}

fn lock_error() -> LedgerError {
    LedgerError::Storage("storage write lock poisoned".into())
}

// --- Ledger records ---

/// Persistent [`RecordStore`] over one pair of column families.
pub struct RocksRecordStore<R> {
    storage: Arc<Storage>,
    records_cf: &'static str,
    keys_cf: &'static str,
    _record: PhantomData<fn() -> R>,
}

impl RocksRecordStore<TenantProvisioningRecord> {
    pub fn tenants(storage: Arc<Storage>) -> Self {
        Self::new(storage, CF_TENANT_RECORDS, CF_TENANT_KEYS)
    }
}

impl RocksRecordStore<CredentialIssuanceRecord> {
    pub fn issuances(storage: Arc<Storage>) -> Self {
        Self::new(storage, CF_ISSUANCE_RECORDS, CF_ISSUANCE_KEYS)
    }
}

impl<R: LedgerRecord> RocksRecordStore<R> {
    fn new(storage: Arc<Storage>, records_cf: &'static str, keys_cf: &'static str) -> Self {
        Self {
            storage,
            records_cf,
            keys_cf,
            _record: PhantomData,
        }
    }

    fn id_for_key(&self, key: &R::Key) -> Result<Option<Uuid>, LedgerError> {
        let bytes = self
            .storage
            .get(self.keys_cf, key.to_string().as_bytes())
            .map_err(storage_error)?;
        match bytes {
            Some(bytes) => Uuid::from_slice(&bytes)
                .map(Some)
                .map_err(|e| LedgerError::Storage(format!("corrupt key index for {key}: {e}"))),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<R: LedgerRecord> RecordStore<R> for RocksRecordStore<R> {
    async fn insert(&self, record: R) -> Result<(), LedgerError> {
        let key = record.key();
        let bytes = serde_json::to_vec(&record).map_err(|e| LedgerError::Storage(e.to_string()))?;

        let _guard = self.storage.write_lock.lock().map_err(|_| lock_error())?;
        if self.id_for_key(&key)?.is_some() {
            return Err(LedgerError::AlreadyExists(key.to_string()));
        }
        self.storage
            .write_indexed(
                self.records_cf,
                self.keys_cf,
                record.id(),
                &key.to_string(),
                &bytes,
            )
            .map_err(storage_error)
    }

    async fn update(&self, record: R) -> Result<(), LedgerError> {
        let _guard = self.storage.write_lock.lock().map_err(|_| lock_error())?;
        let existing: R = self
            .storage
            .get_json(self.records_cf, record.id().as_bytes())
            .map_err(storage_error)?
            .ok_or_else(|| LedgerError::NotFound(record.id().to_string()))?;
        if existing.key() != record.key() {
            return Err(LedgerError::InvalidUpdate(format!(
                "record {} cannot change its key from {} to {}",
                record.id(),
                existing.key(),
                record.key()
            )));
        }
        self.storage
            .put_json(self.records_cf, record.id().as_bytes(), &record)
            .map_err(storage_error)
    }

    async fn get(&self, id: Uuid) -> Result<Option<R>, LedgerError> {
        self.storage
            .get_json(self.records_cf, id.as_bytes())
            .map_err(storage_error)
    }

    async fn find_by_key(&self, key: &R::Key) -> Result<Option<R>, LedgerError> {
        match self.id_for_key(key)? {
            Some(id) => self.get(id).await,
            None => Ok(None),
        }
    }

    async fn query_by_status(
        &self,
        status: R::Status,
        limit: usize,
        exclude: &HashSet<Uuid>,
    ) -> Result<Vec<R>, LedgerError> {
        let mut matching: Vec<R> = self
            .storage
            .scan_json::<R>(self.records_cf)
            .map_err(storage_error)?
            .into_iter()
            .filter(|r| r.status() == status && !exclude.contains(&r.id()))
            .collect();
        matching.sort_by_key(|r| (r.last_modified(), r.id()));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn count(&self) -> Result<usize, LedgerError> {
        self.storage.count(self.records_cf).map_err(storage_error)
    }
}

// --- Directory ---

/// Persistent [`DomainDirectory`].
pub struct StoredDirectory {
    storage: Arc<Storage>,
}

impl StoredDirectory {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, id: Uuid) -> Result<Option<T>, PipelineError> {
        self.storage
            .get_json(cf_name, id.as_bytes())
            .map_err(|e| PipelineError::Directory(e.to_string()))
    }

    fn write<T: Serialize>(&self, cf_name: &str, id: Uuid, value: &T) -> Result<(), PipelineError> {
        self.storage
            .put_json(cf_name, id.as_bytes(), value)
            .map_err(|e| PipelineError::Directory(e.to_string()))
    }
}

#[async_trait]
impl DomainDirectory for StoredDirectory {
    async fn user(&self, id: Uuid) -> Result<Option<User>, PipelineError> {
        self.read(CF_USERS, id)
    }

    async fn organization(&self, id: Uuid) -> Result<Option<Organization>, PipelineError> {
        self.read(CF_ORGANIZATIONS, id)
    }

    async fn opportunity(&self, id: Uuid) -> Result<Option<Opportunity>, PipelineError> {
        self.read(CF_OPPORTUNITIES, id)
    }

    async fn activity_completion(
        &self,
        id: Uuid,
    ) -> Result<Option<ActivityCompletion>, PipelineError> {
        self.read(CF_COMPLETIONS, id)
    }

    async fn put_user(&self, user: User) -> Result<(), PipelineError> {
        self.write(CF_USERS, user.id, &user)
    }

    async fn put_organization(&self, organization: Organization) -> Result<(), PipelineError> {
        self.write(CF_ORGANIZATIONS, organization.id, &organization)
    }

    async fn put_opportunity(&self, opportunity: Opportunity) -> Result<(), PipelineError> {
        self.write(CF_OPPORTUNITIES, opportunity.id, &opportunity)
    }

    async fn put_activity_completion(
        &self,
        completion: ActivityCompletion,
    ) -> Result<(), PipelineError> {
        self.write(CF_COMPLETIONS, completion.id, &completion)
    }
}
