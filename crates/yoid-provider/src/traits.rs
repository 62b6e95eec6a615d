use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{
    CredentialIssuanceRequest, ProviderSchema, RawCredential, SchemaUpsertRequest, TenantRequest,
};

/// SSI provider interface.
///
/// Each implementation bridges the pipeline to a concrete identity/credential
/// service (a hosted cloud agent, an in-memory double, ...). Attribute names
/// are compared case-insensitively by callers and implementations alike.
#[async_trait]
pub trait SsiProvider: Send + Sync {
    /// Return the tenant id for the request's referent, creating the tenant if needed.
    async fn ensure_tenant(&self, request: TenantRequest) -> Result<String, ProviderError>;

    /// Fetch a schema by its full name.
    async fn get_schema_by_name(&self, name: &str)
        -> Result<Option<ProviderSchema>, ProviderError>;

    /// List every schema registered at the provider.
    async fn list_schemas(&self) -> Result<Vec<ProviderSchema>, ProviderError>;

    /// Create a schema, or publish a new version of an existing one.
    async fn upsert_schema(
        &self,
        request: SchemaUpsertRequest,
    ) -> Result<ProviderSchema, ProviderError>;

    /// Fetch a credential from a tenant's wallet.
    async fn get_credential_by_id(
        &self,
        tenant_id: &str,
        credential_id: &str,
    ) -> Result<Option<RawCredential>, ProviderError>;

    /// List credentials in a tenant's wallet, one page at a time.
    async fn list_credentials(
        &self,
        tenant_id: &str,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Vec<RawCredential>, ProviderError>;

    /// Issue a credential; returns the provider's credential id.
    async fn issue_credential(
        &self,
        request: CredentialIssuanceRequest,
    ) -> Result<String, ProviderError>;

    /// Return the unique identifier of this provider (e.g. "ssi-memory").
    fn provider_id(&self) -> &str;
}
