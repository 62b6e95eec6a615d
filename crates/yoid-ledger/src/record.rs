use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use uuid::Uuid;

use yoid_core::{
    ArtifactType, EntityType, IssuanceStatus, LedgerStatus, SchemaType, TenantStatus,
};

/// Common shape of the records held by a ledger.
pub trait LedgerRecord:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Unique business key; at most one record exists per key.
    type Key: Clone + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static;
    type Status: LedgerStatus;

    /// Name of the provider identifier a success carries.
    const EXTERNAL_ID: &'static str;

    fn id(&self) -> Uuid;
    fn key(&self) -> Self::Key;
    fn status(&self) -> Self::Status;
    fn last_modified(&self) -> DateTime<Utc>;

    fn external_id(&self) -> Option<&str>;
    fn error_reason(&self) -> Option<&str>;
    fn retry_count(&self) -> Option<u32>;

    /// Move to the success status, clearing the failure fields.
    fn mark_succeeded(&mut self, external_id: String);
    fn mark_failed(&mut self, reason: String, retry_count: u32, status: Self::Status);
    fn touch(&mut self, at: DateTime<Utc>);
}

/// The entity a tenant is provisioned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "entity_type", content = "entity_id")]
pub enum TenantEntity {
    User(Uuid),
    Organization(Uuid),
}

impl TenantEntity {
    pub fn new(entity_type: EntityType, entity_id: Uuid) -> Self {
        match entity_type {
            EntityType::User => Self::User(entity_id),
            EntityType::Organization => Self::Organization(entity_id),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::User(_) => EntityType::User,
            Self::Organization(_) => EntityType::Organization,
        }
    }

    pub fn entity_id(&self) -> Uuid {
        match self {
            Self::User(id) | Self::Organization(id) => *id,
        }
    }
}

impl fmt::Display for TenantEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type(), self.entity_id())
    }
}

/// A request to provision a tenant at the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantProvisioningRecord {
    pub id: Uuid,
    pub entity: TenantEntity,
    pub status: TenantStatus,
    /// Set only once the tenant is created.
    pub tenant_id: Option<String>,
    pub error_reason: Option<String>,
    pub retry_count: Option<u32>,
    pub date_created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl TenantProvisioningRecord {
    /// A new pending record.
    pub fn new(entity: TenantEntity) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            entity,
            status: TenantStatus::Pending,
            tenant_id: None,
            error_reason: None,
            retry_count: None,
            date_created: now,
            last_modified: now,
        }
    }

    /// Outcome: tenant created.
    pub fn created(mut self, tenant_id: impl Into<String>) -> Self {
        self.status = TenantStatus::Created;
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Outcome: provisioning failed.
    pub fn failed(mut self, reason: impl Into<String>) -> Self {
        self.status = TenantStatus::Error;
        self.error_reason = Some(reason.into());
        self
    }
}

impl LedgerRecord for TenantProvisioningRecord {
    type Key = TenantEntity;
    type Status = TenantStatus;

    const EXTERNAL_ID: &'static str = "tenant id";

    fn id(&self) -> Uuid {
        self.id
    }

    fn key(&self) -> TenantEntity {
        self.entity
    }

    fn status(&self) -> TenantStatus {
        self.status
    }

    fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    fn external_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    fn error_reason(&self) -> Option<&str> {
        self.error_reason.as_deref()
    }

    fn retry_count(&self) -> Option<u32> {
        self.retry_count
    }

    fn mark_succeeded(&mut self, external_id: String) {
        self.status = TenantStatus::Created;
        self.tenant_id = Some(external_id);
        self.error_reason = None;
        self.retry_count = None;
    }

    fn mark_failed(&mut self, reason: String, retry_count: u32, status: TenantStatus) {
        self.status = status;
        self.error_reason = Some(reason);
        self.retry_count = Some(retry_count);
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.last_modified = at;
    }
}

/// What a credential is issued for.
///
/// Opportunity credentials link to the activity completion; YoID credentials
/// link to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "link_type", content = "link_id")]
pub enum IssuanceLink {
    ActivityCompletion(Uuid),
    User(Uuid),
}

impl IssuanceLink {
    /// Link for a schema type.
    pub fn for_schema(schema_type: SchemaType, entity_id: Uuid) -> Self {
        match schema_type {
            SchemaType::Opportunity => Self::ActivityCompletion(entity_id),
            SchemaType::YoId => Self::User(entity_id),
        }
    }

    pub fn entity_id(&self) -> Uuid {
        match self {
            Self::ActivityCompletion(id) | Self::User(id) => *id,
        }
    }
}

impl fmt::Display for IssuanceLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActivityCompletion(id) => write!(f, "ActivityCompletion:{}", id),
            Self::User(id) => write!(f, "User:{}", id),
        }
    }
}

/// Unique key of a credential issuance request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialKey {
    pub schema_type: SchemaType,
    pub link: IssuanceLink,
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.schema_type, self.link)
    }
}

/// A request to issue a credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialIssuanceRecord {
    pub id: Uuid,
    pub schema_type: SchemaType,
    /// Full schema name at the time of scheduling.
    pub schema_name: String,
    pub schema_version: String,
    pub artifact_type: ArtifactType,
    pub link: IssuanceLink,
    pub status: IssuanceStatus,
    /// Set only once the credential is issued.
    pub credential_id: Option<String>,
    pub error_reason: Option<String>,
    pub retry_count: Option<u32>,
    pub date_created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl CredentialIssuanceRecord {
    /// A new pending record.
    pub fn new(
        schema_type: SchemaType,
        schema_name: impl Into<String>,
        schema_version: impl Into<String>,
        artifact_type: ArtifactType,
        link: IssuanceLink,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            schema_type,
            schema_name: schema_name.into(),
            schema_version: schema_version.into(),
            artifact_type,
            link,
            status: IssuanceStatus::Pending,
            credential_id: None,
            error_reason: None,
            retry_count: None,
            date_created: now,
            last_modified: now,
        }
    }

    /// Outcome: credential issued.
    pub fn issued(mut self, credential_id: impl Into<String>) -> Self {
        self.status = IssuanceStatus::Issued;
        self.credential_id = Some(credential_id.into());
        self
    }

    /// Outcome: issuance failed.
    pub fn failed(mut self, reason: impl Into<String>) -> Self {
        self.status = IssuanceStatus::Error;
        self.error_reason = Some(reason.into());
        self
    }
}

impl LedgerRecord for CredentialIssuanceRecord {
    type Key = CredentialKey;
    type Status = IssuanceStatus;

    const EXTERNAL_ID: &'static str = "credential id";

    fn id(&self) -> Uuid {
        self.id
    }

    fn key(&self) -> CredentialKey {
        CredentialKey {
            schema_type: self.schema_type,
            link: self.link,
        }
    }

    fn status(&self) -> IssuanceStatus {
        self.status
    }

    fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    fn external_id(&self) -> Option<&str> {
        self.credential_id.as_deref()
    }

    fn error_reason(&self) -> Option<&str> {
        self.error_reason.as_deref()
    }

    fn retry_count(&self) -> Option<u32> {
        self.retry_count
    }

    fn mark_succeeded(&mut self, external_id: String) {
        self.status = IssuanceStatus::Issued;
        self.credential_id = Some(external_id);
        self.error_reason = None;
        self.retry_count = None;
    }

    fn mark_failed(&mut self, reason: String, retry_count: u32, status: IssuanceStatus) {
        self.status = status;
        self.error_reason = Some(reason);
        self.retry_count = Some(retry_count);
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.last_modified = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_entity_roundtrip_fields() {
        let id = Uuid::now_v7();
        let entity = TenantEntity::new(EntityType::Organization, id);
        assert_eq!(entity.entity_type(), EntityType::Organization);
        assert_eq!(entity.entity_id(), id);
        assert_eq!(entity.to_string(), format!("Organization:{}", id));
    }

    #[test]
    fn test_tenant_entity_serde_shape() {
        let id = Uuid::nil();
        let json = serde_json::to_value(TenantEntity::User(id)).unwrap();
        assert_eq!(json["entity_type"], "User");
        assert_eq!(json["entity_id"], id.to_string());
    }

    #[test]
    fn test_link_follows_schema_type() {
        let id = Uuid::now_v7();
        assert_eq!(
            IssuanceLink::for_schema(SchemaType::Opportunity, id),
            IssuanceLink::ActivityCompletion(id)
        );
        assert_eq!(
            IssuanceLink::for_schema(SchemaType::YoId, id),
            IssuanceLink::User(id)
        );
    }

    #[test]
    fn test_new_records_are_pending() {
        let t = TenantProvisioningRecord::new(TenantEntity::User(Uuid::now_v7()));
        assert_eq!(t.status, TenantStatus::Pending);
        assert!(t.tenant_id.is_none());

        let c = CredentialIssuanceRecord::new(
            SchemaType::YoId,
            "YoID|Default",
            "1.0",
            ArtifactType::Indy,
            IssuanceLink::User(Uuid::now_v7()),
        );
        assert_eq!(c.status, IssuanceStatus::Pending);
        assert_eq!(c.key().schema_type, SchemaType::YoId);
    }

    #[test]
    fn test_outcome_builders() {
        let t = TenantProvisioningRecord::new(TenantEntity::User(Uuid::now_v7())).created("t-1");
        assert_eq!(t.status, TenantStatus::Created);
        assert_eq!(t.tenant_id.as_deref(), Some("t-1"));

        let t = TenantProvisioningRecord::new(TenantEntity::User(Uuid::now_v7())).failed("boom");
        assert_eq!(t.status, TenantStatus::Error);
        assert_eq!(t.error_reason.as_deref(), Some("boom"));
    }
}
