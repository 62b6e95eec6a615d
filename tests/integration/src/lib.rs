//! Shared fixtures for the cross-crate scenarios.
//!
//! [`Pipeline`] wires the real ledgers, registry, scheduler, and wallet
//! reader against the in-memory provider, store, and directory.

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use yoid_core::{
    ActivityCompletion, ArtifactType, Lookup, Opportunity, Organization, PipelineConfig,
    SchemaType, User,
};
use yoid_credentials::{EntityCatalog, SchemaRegistry, SchemaRequest};
use yoid_ledger::{CredentialLedger, MemoryStore, TenantEntity, TenantLedger};
use yoid_pipeline::{DomainDirectory, MemoryDirectory, Scheduler, WalletReader};
use yoid_provider::InMemoryProvider;

pub const LEARNING_SCHEMA: &str = "Opportunity|Learning";
pub const YOID_SCHEMA: &str = "YoID|Default";

pub struct Pipeline {
    pub config: PipelineConfig,
    pub provider: Arc<InMemoryProvider>,
    pub directory: Arc<MemoryDirectory>,
    pub schemas: SchemaRegistry,
    pub tenants: TenantLedger,
    pub credentials: CredentialLedger,
    pub scheduler: Scheduler,
    pub wallet: WalletReader,
    /// Organization configured as the YoID issuer.
    pub issuer: Organization,
}

impl Pipeline {
    /// Default configuration with the two standard schemas registered.
    pub async fn new() -> Self {
        Self::with_config(PipelineConfig::default()).await
    }

    pub async fn with_config(mut config: PipelineConfig) -> Self {
        let issuer = Organization {
            id: Uuid::now_v7(),
            name: "Yoma".into(),
            logo_url: Some("https://yoma.world/logo.png".into()),
        };
        config.yoid.issuer_organization_id = Some(issuer.id);

        let provider = Arc::new(InMemoryProvider::new());
        let directory = Arc::new(MemoryDirectory::new());
        let catalog = Arc::new(EntityCatalog::builtin().expect("builtin catalog"));
        let schemas = SchemaRegistry::new(provider.clone(), catalog);
        let tenants = TenantLedger::new(Arc::new(MemoryStore::new()), config.tenant_retry_policy());
        let credentials = CredentialLedger::new(
            Arc::new(MemoryStore::new()),
            schemas.clone(),
            config.issuance_retry_policy(),
        );
        let scheduler = Scheduler::new(
            config.clone(),
            tenants.clone(),
            credentials.clone(),
            provider.clone(),
            directory.clone(),
        );
        let wallet = WalletReader::new(provider.clone(), tenants.clone(), schemas.clone());

        schemas
            .create(SchemaRequest {
                schema_type: SchemaType::Opportunity,
                artifact_type: ArtifactType::Indy,
                name: "Learning".into(),
                attributes: vec![
                    "Opportunity_Skills".into(),
                    "MyOpportunity_DateCompleted".into(),
                    "User_Email".into(),
                ],
            })
            .await
            .expect("create learning schema");
        schemas
            .create(SchemaRequest {
                schema_type: SchemaType::YoId,
                artifact_type: ArtifactType::Indy,
                name: "Default".into(),
                attributes: vec!["User_Email".into(), "User_Country".into()],
            })
            .await
            .expect("create yoid schema");

        let pipeline = Self {
            config,
            provider,
            directory,
            schemas,
            tenants,
            credentials,
            scheduler,
            wallet,
            issuer,
        };
        pipeline.approve_organization(pipeline.issuer.clone()).await;
        pipeline
    }

    /// Store a user and queue its tenant.
    pub async fn onboard_user(&self, email: &str) -> User {
        let mut user = User::new(Uuid::now_v7(), email);
        user.first_name = Some("Ada".into());
        user.surname = Some("Lovelace".into());
        user.country = Some("South Africa".into());
        user.date_yoid_onboarded = Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap());
        self.directory.put_user(user.clone()).await.expect("put user");
        self.tenants
            .schedule_creation(TenantEntity::User(user.id))
            .await
            .expect("schedule user tenant");
        user
    }

    /// Store an organization and queue its tenant.
    pub async fn approve_organization(&self, organization: Organization) -> Organization {
        self.directory
            .put_organization(organization.clone())
            .await
            .expect("put organization");
        self.tenants
            .schedule_creation(TenantEntity::Organization(organization.id))
            .await
            .expect("schedule organization tenant");
        organization
    }

    /// An opportunity run by `organization` that issues under `schema_name`.
    pub async fn publish_opportunity(
        &self,
        organization: &Organization,
        schema_name: Option<&str>,
    ) -> Opportunity {
        let opportunity = Opportunity {
            id: Uuid::now_v7(),
            title: "Intro to Rust".into(),
            summary: Some("Ownership and borrowing".into()),
            type_name: Some("Learning".into()),
            organization_id: organization.id,
            organization_name: organization.name.clone(),
            organization_logo_url: organization.logo_url.clone(),
            ssi_schema_name: schema_name.map(String::from),
            zlto_reward: Some(50.0),
            date_start: None,
            date_end: None,
            skills: vec![Lookup::named("Coding"), Lookup::named("Writing")],
            countries: Vec::new(),
            languages: Vec::new(),
        };
        self.directory
            .put_opportunity(opportunity.clone())
            .await
            .expect("put opportunity");
        opportunity
    }

    /// Record that `user` completed `opportunity`.
    pub async fn complete(&self, user: &User, opportunity: &Opportunity) -> ActivityCompletion {
        let completion = ActivityCompletion {
            id: Uuid::now_v7(),
            user_id: user.id,
            opportunity_id: opportunity.id,
            date_start: None,
            date_end: None,
            date_completed: Some(Utc.with_ymd_and_hms(2024, 5, 17, 14, 0, 0).unwrap()),
        };
        self.directory
            .put_activity_completion(completion.clone())
            .await
            .expect("put completion");
        completion
    }

    /// Provision every pending tenant.
    pub async fn provision_tenants(&self) {
        let report = self
            .scheduler
            .process_tenant_creation()
            .await
            .expect("tenant run");
        assert_eq!(report.failed(), 0, "tenant run had failures: {report:?}");
        assert_eq!(report.unresolved(), 0, "tenant run left items: {report:?}");
    }

    pub fn organization(&self, name: &str) -> Organization {
        Organization {
            id: Uuid::now_v7(),
            name: name.into(),
            logo_url: None,
        }
    }
}
