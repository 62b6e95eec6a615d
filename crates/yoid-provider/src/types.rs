use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use yoid_core::{ArtifactType, SchemaType, TenantRole};

/// Request to create (or fetch) the tenant for a referent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantRequest {
    /// Stable referent of the owning entity; tenant creation is idempotent per referent.
    pub referent: String,
    pub display_name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub roles: Vec<TenantRole>,
}

/// A schema as registered at the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSchema {
    pub id: String,
    /// Full name (`"{Type}|{DisplayName}"` for schemas owned by this pipeline).
    pub name: String,
    pub version: String,
    pub artifact_type: ArtifactType,
    pub attribute_names: Vec<String>,
}

/// Create-or-update request for a provider schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaUpsertRequest {
    pub name: String,
    pub artifact_type: ArtifactType,
    pub attributes: Vec<String>,
}

/// Payload of a credential issuance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialIssuanceRequest {
    /// Ledger record id, passed through so the provider can de-duplicate.
    pub client_referent: String,
    pub schema_type: SchemaType,
    pub schema_name: String,
    pub artifact_type: ArtifactType,
    pub issuer_tenant_id: String,
    pub holder_tenant_id: String,
    pub attributes: BTreeMap<String, String>,
}

/// A credential held in a tenant's wallet, as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCredential {
    pub id: String,
    pub schema_id: String,
    /// Full name of the schema the credential was issued under.
    pub schema_name: String,
    pub artifact_type: ArtifactType,
    #[serde(default)]
    pub date_issued: Option<DateTime<Utc>>,
    pub attributes: HashMap<String, String>,
}
