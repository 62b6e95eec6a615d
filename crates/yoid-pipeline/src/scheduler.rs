//! Batch scheduler.
//!
//! Both jobs share one mutex, so at most one of them runs at a time in this
//! process. A run pulls batches until the ledger has nothing left or the
//! time box closes, and attempts each record at most once.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use yoid_core::{
    ActivityCompletion, EntityType, ErrorClass, IssuanceStatus, JobConfig, Opportunity,
    PipelineConfig, SourceTag, TenantStatus, User,
};
use yoid_credentials::SourceRecord;
use yoid_ledger::{
    CredentialIssuanceRecord, CredentialLedger, IssuanceLink, TenantEntity, TenantLedger,
    TenantProvisioningRecord,
};
use yoid_provider::{CredentialIssuanceRequest, SsiProvider, TenantRequest};

use crate::directory::DomainDirectory;
use crate::error::PipelineError;
use crate::report::{ItemOutcome, JobKind, OutcomeKind, RunReport};

/// Records and tenants an issuance draws from.
struct IssuanceSources {
    user: User,
    opportunity: Option<Opportunity>,
    completion: Option<ActivityCompletion>,
    issuer_tenant_id: String,
    holder_tenant_id: String,
}

/// Orchestrates the tenant-creation and credential-issuance jobs.
pub struct Scheduler {
    config: PipelineConfig,
    tenants: TenantLedger,
    credentials: CredentialLedger,
    provider: Arc<dyn SsiProvider>,
    directory: Arc<dyn DomainDirectory>,
    lock: Mutex<()>,
}

impl Scheduler {
    pub fn new(
        config: PipelineConfig,
        tenants: TenantLedger,
        credentials: CredentialLedger,
        provider: Arc<dyn SsiProvider>,
        directory: Arc<dyn DomainDirectory>,
    ) -> Self {
        Self {
            config,
            tenants,
            credentials,
            provider,
            directory,
            lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Whether a job is running right now.
    pub fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    /// End of the run's time box; saturates at the latest representable time.
    fn deadline(job: &JobConfig, started_at: DateTime<Utc>) -> DateTime<Utc> {
        started_at
            .checked_add_signed(Duration::hours(i64::from(job.max_run_hours)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    // --- Tenant creation ---

    /// Drain pending tenant-provisioning records.
    pub async fn process_tenant_creation(&self) -> Result<RunReport, PipelineError> {
        let _guard = self.lock.lock().await;
        let job = &self.config.tenant_creation;
        job.validate("tenant_creation")?;
        let mut report = RunReport::start(JobKind::TenantCreation);
        let deadline = Self::deadline(job, report.started_at);
        let mut attempted: HashSet<Uuid> = HashSet::new();

        tracing::info!(batch_size = job.batch_size, deadline = %deadline, "tenant creation run started");

        'run: loop {
            if Utc::now() >= deadline {
                report.deadline_reached = true;
                break;
            }

            let mut batch = self
                .tenants
                .list_pending_creation(job.batch_size, &attempted)
                .await?;
            if batch.is_empty() {
                break;
            }
            report.batches += 1;
            // Users first, then organizations.
            batch.sort_by_key(|r| r.entity.entity_type() == EntityType::Organization);
            tracing::debug!(batch = report.batches, size = batch.len(), "tenant batch pulled");

            for record in batch {
                if Utc::now() >= deadline {
                    report.deadline_reached = true;
                    break 'run;
                }
                attempted.insert(record.id);
                let outcome = self.create_tenant(record).await;
                report.outcomes.push(outcome);
            }
        }

        report.finish();
        tracing::info!(
            batches = report.batches,
            completed = report.completed(),
            failed = report.failed(),
            unresolved = report.unresolved(),
            deadline_reached = report.deadline_reached,
            "tenant creation run finished"
        );
        Ok(report)
    }

    async fn create_tenant(&self, record: TenantProvisioningRecord) -> ItemOutcome {
        let subject = record.entity.to_string();
        let record_id = record.id;

        let request = match self.tenant_request(record.entity).await {
            Ok(request) => request,
            Err(e) => return self.tenant_prep_failure(record, subject, e).await,
        };

        let kind = match self.provider.ensure_tenant(request).await {
            Ok(tenant_id) => match self.tenants.update_creation(&record.created(tenant_id)).await {
                Ok(updated) => OutcomeKind::Completed {
                    external_id: updated.tenant_id.unwrap_or_default(),
                },
                Err(e) => Self::unresolved(&subject, e.into()),
            },
            Err(e) => {
                let class = e.class();
                self.record_tenant_failure(record, &subject, e.to_string(), class)
                    .await
            }
        };

        ItemOutcome {
            record_id,
            subject,
            kind,
        }
    }

    async fn tenant_prep_failure(
        &self,
        record: TenantProvisioningRecord,
        subject: String,
        error: PipelineError,
    ) -> ItemOutcome {
        let record_id = record.id;
        let class = error.class();
        let kind = if class.is_transient() {
            self.record_tenant_failure(record, &subject, error.to_string(), class)
                .await
        } else {
            Self::unresolved(&subject, error)
        };
        ItemOutcome {
            record_id,
            subject,
            kind,
        }
    }

    async fn record_tenant_failure(
        &self,
        record: TenantProvisioningRecord,
        subject: &str,
        reason: String,
        class: ErrorClass,
    ) -> OutcomeKind {
        match self.tenants.update_creation(&record.failed(reason.clone())).await {
            Ok(updated) => OutcomeKind::Failed {
                reason,
                class,
                retry_count: updated.retry_count,
                gave_up: updated.status == TenantStatus::Error,
            },
            Err(e) => Self::unresolved(subject, e.into()),
        }
    }

    async fn tenant_request(&self, entity: TenantEntity) -> Result<TenantRequest, PipelineError> {
        let referent = entity.entity_id().to_string();
        let roles = entity.entity_type().tenant_roles();
        match entity {
            TenantEntity::User(id) => {
                let user = self
                    .directory
                    .user(id)
                    .await?
                    .ok_or_else(|| PipelineError::MissingPrerequisite(format!("user {} not found", id)))?;
                Ok(TenantRequest {
                    referent,
                    display_name: user.tenant_display_name(),
                    image_url: user.photo_url,
                    roles,
                })
            }
            TenantEntity::Organization(id) => {
                let organization = self.directory.organization(id).await?.ok_or_else(|| {
                    PipelineError::MissingPrerequisite(format!("organization {} not found", id))
                })?;
                Ok(TenantRequest {
                    referent,
                    display_name: organization.name,
                    image_url: organization.logo_url,
                    roles,
                })
            }
        }
    }

    // --- Credential issuance ---

    /// Drain pending credential-issuance records.
    pub async fn process_credential_issuance(&self) -> Result<RunReport, PipelineError> {
        let _guard = self.lock.lock().await;
        let job = &self.config.credential_issuance;
        job.validate("credential_issuance")?;
        let mut report = RunReport::start(JobKind::CredentialIssuance);
        let deadline = Self::deadline(job, report.started_at);
        // Attempted this run, including records whose prerequisites are missing.
        let mut skip: HashSet<Uuid> = HashSet::new();

        tracing::info!(batch_size = job.batch_size, deadline = %deadline, "credential issuance run started");

        'run: loop {
            if Utc::now() >= deadline {
                report.deadline_reached = true;
                break;
            }

            let batch = self
                .credentials
                .list_pending_issuance(job.batch_size, &skip)
                .await?;
            if batch.is_empty() {
                break;
            }
            report.batches += 1;
            tracing::debug!(batch = report.batches, size = batch.len(), "issuance batch pulled");

            for record in batch {
                if Utc::now() >= deadline {
                    report.deadline_reached = true;
                    break 'run;
                }
                skip.insert(record.id);
                let outcome = self.issue_credential(record).await;
                report.outcomes.push(outcome);
            }
        }

        report.finish();
        tracing::info!(
            batches = report.batches,
            completed = report.completed(),
            failed = report.failed(),
            unresolved = report.unresolved(),
            deadline_reached = report.deadline_reached,
            "credential issuance run finished"
        );
        Ok(report)
    }

    async fn issue_credential(&self, record: CredentialIssuanceRecord) -> ItemOutcome {
        let subject = format!("{} {}", record.schema_name, record.link);
        let record_id = record.id;

        let kind = match self.issuance_request(&record).await {
            Ok(request) => match self.provider.issue_credential(request).await {
                Ok(credential_id) => {
                    match self
                        .credentials
                        .update_issuance(&record.issued(credential_id))
                        .await
                    {
                        Ok(updated) => OutcomeKind::Completed {
                            external_id: updated.credential_id.unwrap_or_default(),
                        },
                        Err(e) => Self::unresolved(&subject, e.into()),
                    }
                }
                Err(e) => {
                    let class = e.class();
                    self.record_issuance_failure(record, &subject, e.to_string(), class)
                        .await
                }
            },
            Err(e) if e.class().is_transient() => {
                let class = e.class();
                self.record_issuance_failure(record, &subject, e.to_string(), class)
                    .await
            }
            Err(e) => Self::unresolved(&subject, e),
        };

        ItemOutcome {
            record_id,
            subject,
            kind,
        }
    }

    async fn record_issuance_failure(
        &self,
        record: CredentialIssuanceRecord,
        subject: &str,
        reason: String,
        class: ErrorClass,
    ) -> OutcomeKind {
        match self
            .credentials
            .update_issuance(&record.failed(reason.clone()))
            .await
        {
            Ok(updated) => OutcomeKind::Failed {
                reason,
                class,
                retry_count: updated.retry_count,
                gave_up: updated.status == IssuanceStatus::Error,
            },
            Err(e) => Self::unresolved(subject, e.into()),
        }
    }

    /// Build the provider request for a pending record.
    async fn issuance_request(
        &self,
        record: &CredentialIssuanceRecord,
    ) -> Result<CredentialIssuanceRequest, PipelineError> {
        if record.schema_name.trim().is_empty() {
            return Err(PipelineError::MissingPrerequisite(format!(
                "record {} has no schema name",
                record.id
            )));
        }

        let sources = match record.link {
            IssuanceLink::ActivityCompletion(id) => self.opportunity_sources(id).await?,
            IssuanceLink::User(id) => self.yoid_sources(id).await?,
        };

        let schema = self
            .credentials
            .schemas()
            .get_by_name(&record.schema_name)
            .await?;
        let catalog = self.credentials.schemas().catalog();
        let resolver = catalog.resolver();

        let mut attributes = BTreeMap::new();
        for entity in &schema.entities {
            let source = match entity.source {
                SourceTag::User => SourceRecord::User(&sources.user),
                SourceTag::Opportunity => sources
                    .opportunity
                    .as_ref()
                    .map(SourceRecord::Opportunity)
                    .ok_or_else(|| Self::no_source(&schema.full_name, &entity.name))?,
                SourceTag::ActivityCompletion => sources
                    .completion
                    .as_ref()
                    .map(SourceRecord::ActivityCompletion)
                    .ok_or_else(|| Self::no_source(&schema.full_name, &entity.name))?,
            };
            resolver.resolve_into(entity, source, &mut attributes)?;
        }

        Ok(CredentialIssuanceRequest {
            client_referent: record.id.to_string(),
            schema_type: schema.schema_type,
            schema_name: schema.full_name,
            artifact_type: schema.artifact_type,
            issuer_tenant_id: sources.issuer_tenant_id,
            holder_tenant_id: sources.holder_tenant_id,
            attributes,
        })
    }

    fn no_source(schema: &str, entity: &str) -> PipelineError {
        PipelineError::MissingPrerequisite(format!(
            "schema {} uses entity '{}', which has no source record for this credential",
            schema, entity
        ))
    }

    async fn opportunity_sources(&self, completion_id: Uuid) -> Result<IssuanceSources, PipelineError> {
        let completion = self
            .directory
            .activity_completion(completion_id)
            .await?
            .ok_or_else(|| {
                PipelineError::MissingPrerequisite(format!(
                    "activity completion {} not found",
                    completion_id
                ))
            })?;
        let opportunity = self
            .directory
            .opportunity(completion.opportunity_id)
            .await?
            .ok_or_else(|| {
                PipelineError::MissingPrerequisite(format!(
                    "opportunity {} not found",
                    completion.opportunity_id
                ))
            })?;
        if opportunity
            .ssi_schema_name
            .as_deref()
            .map_or(true, |name| name.trim().is_empty())
        {
            return Err(PipelineError::MissingPrerequisite(format!(
                "opportunity {} has no credential schema",
                opportunity.id
            )));
        }
        let user = self
            .directory
            .user(completion.user_id)
            .await?
            .ok_or_else(|| {
                PipelineError::MissingPrerequisite(format!("user {} not found", completion.user_id))
            })?;

        let issuer_tenant_id = self
            .tenant_id(TenantEntity::Organization(opportunity.organization_id))
            .await?;
        let holder_tenant_id = self.tenant_id(TenantEntity::User(user.id)).await?;

        Ok(IssuanceSources {
            user,
            opportunity: Some(opportunity),
            completion: Some(completion),
            issuer_tenant_id,
            holder_tenant_id,
        })
    }

    async fn yoid_sources(&self, user_id: Uuid) -> Result<IssuanceSources, PipelineError> {
        let issuer_id = self.config.yoid.issuer_organization_id.ok_or_else(|| {
            PipelineError::MissingPrerequisite("no YoID issuer organization configured".into())
        })?;
        let mut user = self
            .directory
            .user(user_id)
            .await?
            .ok_or_else(|| PipelineError::MissingPrerequisite(format!("user {} not found", user_id)))?;

        if let Some(issuer) = self.directory.organization(issuer_id).await? {
            if user.yoid_issuer_name.is_none() {
                user.yoid_issuer_name = Some(issuer.name);
            }
            if user.yoid_issuer_logo_url.is_none() {
                user.yoid_issuer_logo_url = issuer.logo_url;
            }
        }

        let issuer_tenant_id = self.tenant_id(TenantEntity::Organization(issuer_id)).await?;
        let holder_tenant_id = self.tenant_id(TenantEntity::User(user.id)).await?;

        Ok(IssuanceSources {
            user,
            opportunity: None,
            completion: None,
            issuer_tenant_id,
            holder_tenant_id,
        })
    }

    async fn tenant_id(&self, entity: TenantEntity) -> Result<String, PipelineError> {
        self.tenants
            .get_tenant_id_or_none(entity)
            .await?
            .ok_or_else(|| {
                PipelineError::MissingPrerequisite(format!("tenant for {} not provisioned yet", entity))
            })
    }

    fn unresolved(subject: &str, error: PipelineError) -> OutcomeKind {
        let class = error.class();
        match class {
            ErrorClass::DataInconsistency | ErrorClass::Internal => {
                tracing::error!(subject = %subject, class = %class, error = %error, "item left unresolved")
            }
            _ => tracing::warn!(subject = %subject, class = %class, error = %error, "item left unresolved"),
        }
        OutcomeKind::Unresolved {
            reason: error.to_string(),
            class,
        }
    }
}
