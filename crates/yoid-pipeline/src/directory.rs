use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use yoid_core::{ActivityCompletion, Opportunity, Organization, User};

use crate::error::PipelineError;

/// Read models of the surrounding application.
///
/// The pipeline reads them to build tenant requests and as attribute
/// sources; the `put_*` methods are how domain events feed them in.
#[async_trait]
pub trait DomainDirectory: Send + Sync {
    async fn user(&self, id: Uuid) -> Result<Option<User>, PipelineError>;

    async fn organization(&self, id: Uuid) -> Result<Option<Organization>, PipelineError>;

    async fn opportunity(&self, id: Uuid) -> Result<Option<Opportunity>, PipelineError>;

    async fn activity_completion(
        &self,
        id: Uuid,
    ) -> Result<Option<ActivityCompletion>, PipelineError>;

    async fn put_user(&self, user: User) -> Result<(), PipelineError>;

    async fn put_organization(&self, organization: Organization) -> Result<(), PipelineError>;

    async fn put_opportunity(&self, opportunity: Opportunity) -> Result<(), PipelineError>;

    async fn put_activity_completion(
        &self,
        completion: ActivityCompletion,
    ) -> Result<(), PipelineError>;
}

/// In-process directory.
#[derive(Default)]
pub struct MemoryDirectory {
    users: DashMap<Uuid, User>,
    organizations: DashMap<Uuid, Organization>,
    opportunities: DashMap<Uuid, Opportunity>,
    completions: DashMap<Uuid, ActivityCompletion>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DomainDirectory for MemoryDirectory {
    async fn user(&self, id: Uuid) -> Result<Option<User>, PipelineError> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn organization(&self, id: Uuid) -> Result<Option<Organization>, PipelineError> {
        Ok(self.organizations.get(&id).map(|o| o.clone()))
    }

    async fn opportunity(&self, id: Uuid) -> Result<Option<Opportunity>, PipelineError> {
        Ok(self.opportunities.get(&id).map(|o| o.clone()))
    }

    async fn activity_completion(
        &self,
        id: Uuid,
    ) -> Result<Option<ActivityCompletion>, PipelineError> {
        Ok(self.completions.get(&id).map(|c| c.clone()))
    }

    async fn put_user(&self, user: User) -> Result<(), PipelineError> {
        self.users.insert(user.id, user);
        Ok(())
    }

    async fn put_organization(&self, organization: Organization) -> Result<(), PipelineError> {
        self.organizations.insert(organization.id, organization);
        Ok(())
    }

    async fn put_opportunity(&self, opportunity: Opportunity) -> Result<(), PipelineError> {
        self.opportunities.insert(opportunity.id, opportunity);
        Ok(())
    }

    async fn put_activity_completion(
        &self,
        completion: ActivityCompletion,
    ) -> Result<(), PipelineError> {
        self.completions.insert(completion.id, completion);
        Ok(())
    }
}
