//! Shared node state: the wired pipeline plus the domain-event intake.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use yoid_core::{ActivityCompletion, CoreError, Opportunity, Organization, PipelineConfig, SchemaType, User};
use yoid_credentials::{EntityCatalog, SchemaRegistry};
use yoid_ledger::{
    CredentialIssuanceRecord, CredentialKey, CredentialLedger, IssuanceLink, LedgerError,
    RecordStore, TenantEntity, TenantLedger, TenantProvisioningRecord,
};
use yoid_pipeline::{DomainDirectory, JobKind, PipelineError, RunReport, Scheduler, WalletReader};
use yoid_provider::SsiProvider;

/// What an event scheduled (or found already scheduled).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventReceipt {
    #[serde(default)]
    pub tenant_record_id: Option<Uuid>,
    #[serde(default)]
    pub issuance_record_id: Option<Uuid>,
}

/// State shared between the API handlers and the job tickers.
pub struct NodeState {
    pub config: PipelineConfig,
    pub scheduler: Arc<Scheduler>,
    pub tenants: TenantLedger,
    pub credentials: CredentialLedger,
    pub schemas: SchemaRegistry,
    pub wallet: WalletReader,
    pub directory: Arc<dyn DomainDirectory>,
    pub start_time: Instant,
    last_reports: DashMap<JobKind, RunReport>,
}

impl NodeState {
    pub fn new(
        config: PipelineConfig,
        provider: Arc<dyn SsiProvider>,
        catalog: Arc<EntityCatalog>,
        tenant_store: Arc<dyn RecordStore<TenantProvisioningRecord>>,
        issuance_store: Arc<dyn RecordStore<CredentialIssuanceRecord>>,
        directory: Arc<dyn DomainDirectory>,
    ) -> Self {
        let schemas = SchemaRegistry::new(provider.clone(), catalog);
        let tenants = TenantLedger::new(tenant_store, config.tenant_retry_policy());
        let credentials = CredentialLedger::new(
            issuance_store,
            schemas.clone(),
            config.issuance_retry_policy(),
        );
        let wallet = WalletReader::new(provider.clone(), tenants.clone(), schemas.clone());
        let scheduler = Arc::new(Scheduler::new(
            config.clone(),
            tenants.clone(),
            credentials.clone(),
            provider,
            directory.clone(),
        ));

        Self {
            config,
            scheduler,
            tenants,
            credentials,
            schemas,
            wallet,
            directory,
            start_time: Instant::now(),
            last_reports: DashMap::new(),
        }
    }

    /// Run one job now and remember its report.
    pub async fn run_job(&self, job: JobKind) -> Result<RunReport, PipelineError> {
        let report = match job {
            JobKind::TenantCreation => self.scheduler.process_tenant_creation().await?,
            JobKind::CredentialIssuance => self.scheduler.process_credential_issuance().await?,
        };
        self.last_reports.insert(job, report.clone());
        Ok(report)
    }

    pub fn last_report(&self, job: JobKind) -> Option<RunReport> {
        self.last_reports.get(&job).map(|r| r.clone())
    }

    // --- Domain events ---

    /// Store the user and queue its tenant and YoID credential.
    pub async fn user_onboarded(&self, user: User) -> Result<EventReceipt, PipelineError> {
        let user_id = user.id;
        self.directory.put_user(user).await?;
        let tenant = self
            .tenants
            .schedule_creation(TenantEntity::User(user_id))
            .await?;
        let issuance = self
            .schedule_issuance_once(&self.config.yoid.schema_name, user_id)
            .await?;

        tracing::info!(user_id = %user_id, "user onboarded");
        Ok(EventReceipt {
            tenant_record_id: Some(tenant.id),
            issuance_record_id: Some(issuance.id),
        })
    }

    /// Store the organization and queue its tenant.
    pub async fn organization_approved(
        &self,
        organization: Organization,
    ) -> Result<EventReceipt, PipelineError> {
        let organization_id = organization.id;
        self.directory.put_organization(organization).await?;
        let tenant = self
            .tenants
            .schedule_creation(TenantEntity::Organization(organization_id))
            .await?;

        tracing::info!(organization_id = %organization_id, "organization approved");
        Ok(EventReceipt {
            tenant_record_id: Some(tenant.id),
            issuance_record_id: None,
        })
    }

    /// Store the completion and its opportunity; queue a credential when the
    /// opportunity names a schema.
    pub async fn activity_completed(
        &self,
        completion: ActivityCompletion,
        opportunity: Opportunity,
    ) -> Result<EventReceipt, PipelineError> {
        if completion.opportunity_id != opportunity.id {
            return Err(CoreError::ValidationError(format!(
                "completion {} references opportunity {}, not {}",
                completion.id, completion.opportunity_id, opportunity.id
            ))
            .into());
        }

        let completion_id = completion.id;
        let schema_name = opportunity.ssi_schema_name.clone();
        self.directory.put_opportunity(opportunity).await?;
        self.directory.put_activity_completion(completion).await?;

        let issuance_record_id = match schema_name {
            Some(schema_name) => Some(
                self.schedule_issuance_once(&schema_name, completion_id)
                    .await?
                    .id,
            ),
            None => {
                tracing::debug!(completion_id = %completion_id, "opportunity issues no credential");
                None
            }
        };

        tracing::info!(completion_id = %completion_id, "activity completed");
        Ok(EventReceipt {
            tenant_record_id: None,
            issuance_record_id,
        })
    }

    /// Events may be replayed; an existing record for the key is returned.
    async fn schedule_issuance_once(
        &self,
        schema_full_name: &str,
        entity_id: Uuid,
    ) -> Result<CredentialIssuanceRecord, PipelineError> {
        match self
            .credentials
            .schedule_issuance(schema_full_name, entity_id)
            .await
        {
            Ok(record) => Ok(record),
            Err(LedgerError::AlreadyExists(key)) => {
                let (schema_type, _) = SchemaType::parse_full_name(schema_full_name)?;
                let key_ref = CredentialKey {
                    schema_type,
                    link: IssuanceLink::for_schema(schema_type, entity_id),
                };
                self.credentials
                    .find(&key_ref)
                    .await?
                    .ok_or_else(|| LedgerError::NotFound(key).into())
            }
            Err(e) => Err(e.into()),
        }
    }
}
