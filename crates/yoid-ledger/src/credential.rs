use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use yoid_core::{IssuanceStatus, RetryPolicy};
use yoid_credentials::SchemaRegistry;

use crate::error::LedgerError;
use crate::outcome::apply_outcome;
use crate::record::{CredentialIssuanceRecord, CredentialKey, IssuanceLink};
use crate::store::RecordStore;

/// State machine over credential-issuance requests.
///
/// Same shape as the tenant ledger, keyed by (schema type, linked entity).
#[derive(Clone)]
pub struct CredentialLedger {
    store: Arc<dyn RecordStore<CredentialIssuanceRecord>>,
    schemas: SchemaRegistry,
    policy: RetryPolicy,
}

impl CredentialLedger {
    pub fn new(
        store: Arc<dyn RecordStore<CredentialIssuanceRecord>>,
        schemas: SchemaRegistry,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            schemas,
            policy,
        }
    }

    /// Queue issuance of a credential under `schema_full_name`.
    ///
    /// `entity_id` is the activity completion for Opportunity schemas and the
    /// user for YoID schemas. A second request for the same key fails.
    pub async fn schedule_issuance(
        &self,
        schema_full_name: &str,
        entity_id: Uuid,
    ) -> Result<CredentialIssuanceRecord, LedgerError> {
        let schema = self.schemas.get_by_name(schema_full_name).await?;
        let key = CredentialKey {
            schema_type: schema.schema_type,
            link: IssuanceLink::for_schema(schema.schema_type, entity_id),
        };

        if self.store.find_by_key(&key).await?.is_some() {
            return Err(LedgerError::AlreadyExists(key.to_string()));
        }

        let record = CredentialIssuanceRecord::new(
            schema.schema_type,
            schema.full_name,
            schema.version,
            schema.artifact_type,
            key.link,
        );
        self.store.insert(record.clone()).await?;

        tracing::info!(
            record_id = %record.id,
            schema = %record.schema_name,
            link = %record.link,
            "credential issuance scheduled"
        );
        Ok(record)
    }

    /// Pending records, least recently modified first, minus `skip`.
    pub async fn list_pending_issuance(
        &self,
        batch_size: usize,
        skip: &HashSet<Uuid>,
    ) -> Result<Vec<CredentialIssuanceRecord>, LedgerError> {
        self.store
            .query_by_status(IssuanceStatus::Pending, batch_size, skip)
            .await
    }

    /// Apply an outcome (`Issued` or `Error`) to a pending record.
    pub async fn update_issuance(
        &self,
        outcome: &CredentialIssuanceRecord,
    ) -> Result<CredentialIssuanceRecord, LedgerError> {
        let mut record = self
            .store
            .get(outcome.id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(outcome.id.to_string()))?;
        match apply_outcome(&mut record, outcome, &self.policy)? {
            None => tracing::info!(
                record_id = %record.id,
                schema = %record.schema_name,
                credential_id = ?record.credential_id,
                "credential issued"
            ),
            Some(decision) => tracing::warn!(
                record_id = %record.id,
                schema = %record.schema_name,
                retry_count = decision.retry_count,
                status = %record.status,
                reason = ?record.error_reason,
                "credential issuance failed"
            ),
        }

        self.store.update(record.clone()).await?;
        Ok(record)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<CredentialIssuanceRecord>, LedgerError> {
        self.store.get(id).await
    }

    /// The record on file for a key.
    pub async fn find(
        &self,
        key: &CredentialKey,
    ) -> Result<Option<CredentialIssuanceRecord>, LedgerError> {
        self.store.find_by_key(key).await
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }
}
