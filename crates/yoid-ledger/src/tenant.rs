use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use yoid_core::{RetryPolicy, TenantStatus};

use crate::error::LedgerError;
use crate::outcome::apply_outcome;
use crate::record::{TenantEntity, TenantProvisioningRecord};
use crate::store::RecordStore;

/// State machine over tenant-provisioning requests.
///
/// Transitions: Pending → Created, Pending → Error → Pending (retry), and
/// Error as a resting state once the retry budget is spent.
#[derive(Clone)]
pub struct TenantLedger {
    store: Arc<dyn RecordStore<TenantProvisioningRecord>>,
    policy: RetryPolicy,
}

impl TenantLedger {
    pub fn new(store: Arc<dyn RecordStore<TenantProvisioningRecord>>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Queue tenant creation for an entity. Returns the existing record when
    /// one is already on file.
    pub async fn schedule_creation(
        &self,
        entity: TenantEntity,
    ) -> Result<TenantProvisioningRecord, LedgerError> {
        if let Some(existing) = self.store.find_by_key(&entity).await? {
            tracing::debug!(entity = %entity, status = %existing.status, "tenant creation already scheduled");
            return Ok(existing);
        }

        let record = TenantProvisioningRecord::new(entity);
        match self.store.insert(record.clone()).await {
            Ok(()) => {
                tracing::info!(record_id = %record.id, entity = %entity, "tenant creation scheduled");
                Ok(record)
            }
            Err(LedgerError::AlreadyExists(_)) => self
                .store
                .find_by_key(&entity)
                .await?
                .ok_or_else(|| LedgerError::NotFound(entity.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Pending records, least recently modified first.
    pub async fn list_pending_creation(
        &self,
        batch_size: usize,
        skip: &HashSet<Uuid>,
    ) -> Result<Vec<TenantProvisioningRecord>, LedgerError> {
        self.store
            .query_by_status(TenantStatus::Pending, batch_size, skip)
            .await
    }

    /// Apply an outcome (`Created` or `Error`) to a pending record.
    pub async fn update_creation(
        &self,
        outcome: &TenantProvisioningRecord,
    ) -> Result<TenantProvisioningRecord, LedgerError> {
        let mut record = self
            .store
            .get(outcome.id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(outcome.id.to_string()))?;
        match apply_outcome(&mut record, outcome, &self.policy)? {
            None => tracing::info!(
                record_id = %record.id,
                entity = %record.entity,
                tenant_id = ?record.tenant_id,
                "tenant created"
            ),
            Some(decision) => tracing::warn!(
                record_id = %record.id,
                entity = %record.entity,
                retry_count = decision.retry_count,
                status = %record.status,
                reason = ?record.error_reason,
                "tenant creation failed"
            ),
        }

        self.store.update(record.clone()).await?;
        Ok(record)
    }

    /// The record on file for an entity.
    pub async fn get(
        &self,
        entity: TenantEntity,
    ) -> Result<Option<TenantProvisioningRecord>, LedgerError> {
        self.store.find_by_key(&entity).await
    }

    /// Tenant id of a created tenant; an error when there is none yet.
    pub async fn get_tenant_id(&self, entity: TenantEntity) -> Result<String, LedgerError> {
        self.get_tenant_id_or_none(entity)
            .await?
            .ok_or_else(|| LedgerError::TenantNotProvisioned(entity.to_string()))
    }

    /// Tenant id of a created tenant.
    pub async fn get_tenant_id_or_none(
        &self,
        entity: TenantEntity,
    ) -> Result<Option<String>, LedgerError> {
        Ok(self
            .store
            .find_by_key(&entity)
            .await?
            .filter(|r| r.status == TenantStatus::Created)
            .and_then(|r| r.tenant_id))
    }
}
