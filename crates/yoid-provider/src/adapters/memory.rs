use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use uuid::Uuid;

use crate::error::ProviderError;
use crate::traits::SsiProvider;
use crate::types::{
    CredentialIssuanceRequest, ProviderSchema, RawCredential, SchemaUpsertRequest, TenantRequest,
};

/// Internal record for a tenant.
#[derive(Debug, Clone)]
struct InternalTenant {
    id: String,
    request: TenantRequest,
}

/// Internal record for an issued credential.
#[derive(Debug, Clone)]
struct InternalCredential {
    seq: u64,
    holder_tenant_id: String,
    request: Option<CredentialIssuanceRequest>,
    credential: RawCredential,
}

/// In-process provider.
///
/// Keeps tenants, schemas, and credentials in memory. Used for local runs
/// and as the test double for everything that talks to a provider.
/// Failures can be injected per referent, per schema, or globally.
pub struct InMemoryProvider {
    /// Tenants keyed by referent.
    tenants: DashMap<String, InternalTenant>,
    /// Schemas keyed by lower-cased full name.
    schemas: DashMap<String, ProviderSchema>,
    /// Credentials keyed by credential id.
    credentials: DashMap<String, InternalCredential>,
    /// Referent -> error message for injected tenant failures.
    failing_referents: DashMap<String, String>,
    /// Lower-cased schema name -> error message for injected issuance failures.
    failing_schemas: DashMap<String, String>,
    /// Every call fails while set.
    unavailable: AtomicBool,
    /// Insertion order for credential listing.
    sequence: AtomicU64,
}

impl InMemoryProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self {
            tenants: DashMap::new(),
            schemas: DashMap::new(),
            credentials: DashMap::new(),
            failing_referents: DashMap::new(),
            failing_schemas: DashMap::new(),
            unavailable: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
        }
    }

    /// Make every call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `ensure_tenant` fail for a referent.
    pub fn fail_tenant(&self, referent: impl Into<String>, message: impl Into<String>) {
        self.failing_referents.insert(referent.into(), message.into());
    }

    /// Make issuance fail for a schema.
    pub fn fail_issuance(&self, schema_name: &str, message: impl Into<String>) {
        self.failing_schemas
            .insert(schema_name.to_lowercase(), message.into());
    }

    /// Clear all injected failures.
    pub fn clear_failures(&self) {
        self.failing_referents.clear();
        self.failing_schemas.clear();
        self.set_unavailable(false);
    }

    /// Register a schema directly, bypassing upsert versioning.
    pub fn put_schema(&self, schema: ProviderSchema) {
        self.schemas.insert(schema.name.to_lowercase(), schema);
    }

    /// Place a credential directly into a tenant's wallet.
    pub fn put_credential(&self, holder_tenant_id: &str, credential: RawCredential) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.credentials.insert(
            credential.id.clone(),
            InternalCredential {
                seq,
                holder_tenant_id: holder_tenant_id.to_string(),
                request: None,
                credential,
            },
        );
    }

    /// Tenant id assigned to a referent, if any.
    pub fn tenant_id_for(&self, referent: &str) -> Option<String> {
        self.tenants.get(referent).map(|t| t.id.clone())
    }

    /// Number of tenants created.
    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }

    /// Number of credentials held across all wallets.
    pub fn credential_count(&self) -> usize {
        self.credentials.len()
    }

    /// The request a credential was issued from.
    pub fn issuance_request(&self, credential_id: &str) -> Option<CredentialIssuanceRequest> {
        self.credentials
            .get(credential_id)
            .and_then(|c| c.request.clone())
    }

    fn check_available(&self) -> Result<(), ProviderError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("in-memory provider offline".into()));
        }
        Ok(())
    }

    fn bump_version(version: &str) -> String {
        let mut parts = version.split('.');
        let major = parts.next().and_then(|p| p.parse::<u32>().ok()).unwrap_or(1);
        let minor = parts.next().and_then(|p| p.parse::<u32>().ok()).unwrap_or(0);
        format!("{}.{}", major, minor + 1)
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SsiProvider for InMemoryProvider {
    async fn ensure_tenant(&self, request: TenantRequest) -> Result<String, ProviderError> {
        self.check_available()?;
        if let Some(message) = self.failing_referents.get(&request.referent) {
            return Err(ProviderError::Rejected(message.clone()));
        }

        let referent = request.referent.clone();
        let tenant = self
            .tenants
            .entry(referent.clone())
            .or_insert_with(|| InternalTenant {
                id: Uuid::now_v7().to_string(),
                request,
            });

        tracing::info!(
            referent = %referent,
            tenant_id = %tenant.id,
            display_name = %tenant.request.display_name,
            "in-memory tenant ensured"
        );
        Ok(tenant.id.clone())
    }

    async fn get_schema_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ProviderSchema>, ProviderError> {
        self.check_available()?;
        Ok(self.schemas.get(&name.to_lowercase()).map(|s| s.clone()))
    }

    async fn list_schemas(&self) -> Result<Vec<ProviderSchema>, ProviderError> {
        self.check_available()?;
        let mut schemas: Vec<ProviderSchema> =
            self.schemas.iter().map(|e| e.value().clone()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(schemas)
    }

    async fn upsert_schema(
        &self,
        request: SchemaUpsertRequest,
    ) -> Result<ProviderSchema, ProviderError> {
        self.check_available()?;
        if request.attributes.is_empty() {
            return Err(ProviderError::Rejected(
                "schema must have at least one attribute".into(),
            ));
        }

        let key = request.name.to_lowercase();
        let schema = match self.schemas.get(&key).map(|s| s.clone()) {
            Some(existing) => ProviderSchema {
                id: format!("{}:{}", existing.name, Self::bump_version(&existing.version)),
                version: Self::bump_version(&existing.version),
                name: existing.name,
                artifact_type: request.artifact_type,
                attribute_names: request.attributes,
            },
            None => ProviderSchema {
                id: format!("{}:1.0", request.name),
                name: request.name,
                version: "1.0".into(),
                artifact_type: request.artifact_type,
                attribute_names: request.attributes,
            },
        };

        self.schemas.insert(key, schema.clone());
        tracing::info!(schema = %schema.name, version = %schema.version, "in-memory schema upserted");
        Ok(schema)
    }

    async fn get_credential_by_id(
        &self,
        tenant_id: &str,
        credential_id: &str,
    ) -> Result<Option<RawCredential>, ProviderError> {
        self.check_available()?;
        Ok(self
            .credentials
            .get(credential_id)
            .filter(|c| c.holder_tenant_id == tenant_id)
            .map(|c| c.credential.clone()))
    }

    async fn list_credentials(
        &self,
        tenant_id: &str,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Vec<RawCredential>, ProviderError> {
        self.check_available()?;
        let mut held: Vec<(u64, RawCredential)> = self
            .credentials
            .iter()
            .filter(|c| c.holder_tenant_id == tenant_id)
            .map(|c| (c.seq, c.credential.clone()))
            .collect();
        held.sort_by_key(|(seq, _)| *seq);

        let held = held.into_iter().map(|(_, c)| c);
        let result = match page_size {
            Some(size) if size > 0 => {
                let page = page.unwrap_or(1).max(1) as usize - 1;
                held.skip(page.saturating_mul(size as usize))
                    .take(size as usize)
                    .collect()
            }
            _ => held.collect(),
        };
        Ok(result)
    }

    async fn issue_credential(
        &self,
        request: CredentialIssuanceRequest,
    ) -> Result<String, ProviderError> {
        self.check_available()?;
        if let Some(message) = self.failing_schemas.get(&request.schema_name.to_lowercase()) {
            return Err(ProviderError::Rejected(message.clone()));
        }

        let schema = self
            .schemas
            .get(&request.schema_name.to_lowercase())
            .map(|s| s.clone())
            .ok_or_else(|| ProviderError::NotFound(format!("schema {}", request.schema_name)))?;

        let known_tenants: HashSet<String> = self.tenants.iter().map(|t| t.id.clone()).collect();
        for tenant in [&request.issuer_tenant_id, &request.holder_tenant_id] {
            if !known_tenants.contains(tenant) {
                return Err(ProviderError::Rejected(format!("unknown tenant {}", tenant)));
            }
        }

        let expected: HashSet<String> = schema
            .attribute_names
            .iter()
            .map(|a| a.to_lowercase())
            .collect();
        let supplied: HashSet<String> = request.attributes.keys().map(|a| a.to_lowercase()).collect();
        if expected != supplied {
            return Err(ProviderError::Rejected(format!(
                "attributes do not match schema {}",
                schema.name
            )));
        }

        let credential_id = Uuid::now_v7().to_string();
        let credential = RawCredential {
            id: credential_id.clone(),
            schema_id: schema.id.clone(),
            schema_name: schema.name.clone(),
            artifact_type: request.artifact_type,
            date_issued: Some(Utc::now()),
            attributes: request
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };

        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.credentials.insert(
            credential_id.clone(),
            InternalCredential {
                seq,
                holder_tenant_id: request.holder_tenant_id.clone(),
                request: Some(request),
                credential,
            },
        );

        tracing::info!(credential_id = %credential_id, schema = %schema.name, "in-memory credential issued");
        Ok(credential_id)
    }

    fn provider_id(&self) -> &str {
        "ssi-memory"
    }
}
