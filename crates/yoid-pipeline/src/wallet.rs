use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use yoid_core::SchemaType;
use yoid_credentials::{parse_credential, CredentialView, SchemaDefinition, SchemaRegistry, ViewDetail};
use yoid_ledger::{TenantEntity, TenantLedger};
use yoid_provider::SsiProvider;

use crate::error::PipelineError;

/// Search parameters for a user's wallet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialFilter {
    #[serde(default, rename = "type")]
    pub schema_type: Option<SchemaType>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

/// Reads issued credentials back into display models.
///
/// Independent of the scheduler lock. A user whose tenant is still pending
/// simply has an empty wallet.
#[derive(Clone)]
pub struct WalletReader {
    provider: Arc<dyn SsiProvider>,
    tenants: TenantLedger,
    schemas: SchemaRegistry,
}

impl WalletReader {
    pub fn new(provider: Arc<dyn SsiProvider>, tenants: TenantLedger, schemas: SchemaRegistry) -> Self {
        Self {
            provider,
            tenants,
            schemas,
        }
    }

    /// Summaries of a user's credentials.
    ///
    /// Paging is applied by the provider; the type filter is applied to the
    /// returned page.
    pub async fn search_user_credentials(
        &self,
        user_id: Uuid,
        filter: &CredentialFilter,
    ) -> Result<Vec<CredentialView>, PipelineError> {
        let tenant_id = match self.tenants.get_tenant_id_or_none(TenantEntity::User(user_id)).await? {
            Some(tenant_id) => tenant_id,
            None => {
                tracing::debug!(user_id = %user_id, "wallet requested before tenant creation");
                return Ok(Vec::new());
            }
        };

        let raws = self
            .provider
            .list_credentials(&tenant_id, filter.page, filter.page_size)
            .await?;

        let mut schemas: HashMap<String, Option<SchemaDefinition>> = HashMap::new();
        let mut views = Vec::with_capacity(raws.len());
        for raw in raws {
            let parsed_type = match SchemaType::parse_full_name(&raw.schema_name) {
                Ok((t, _)) => t,
                Err(_) => {
                    tracing::debug!(credential_id = %raw.id, schema = %raw.schema_name, "skipping credential of foreign schema");
                    continue;
                }
            };
            if filter.schema_type.is_some_and(|t| t != parsed_type) {
                continue;
            }

            let key = raw.schema_name.to_lowercase();
            if !schemas.contains_key(&key) {
                let schema = self.schemas.get_by_name_or_none(&raw.schema_name).await?;
                schemas.insert(key.clone(), schema);
            }
            let Some(schema) = schemas.get(&key).and_then(Option::as_ref) else {
                tracing::warn!(credential_id = %raw.id, schema = %raw.schema_name, "credential schema no longer registered");
                continue;
            };

            views.push(parse_credential(schema, &raw, ViewDetail::Summary)?);
        }
        Ok(views)
    }

    /// Full view of one credential; `None` if the tenant or the credential
    /// does not exist.
    pub async fn get_credential_by_id(
        &self,
        user_id: Uuid,
        credential_id: &str,
    ) -> Result<Option<CredentialView>, PipelineError> {
        let Some(tenant_id) = self
            .tenants
            .get_tenant_id_or_none(TenantEntity::User(user_id))
            .await?
        else {
            return Ok(None);
        };

        let Some(raw) = self
            .provider
            .get_credential_by_id(&tenant_id, credential_id)
            .await?
        else {
            return Ok(None);
        };

        let schema = self.schemas.get_by_name(&raw.schema_name).await?;
        Ok(Some(parse_credential(&schema, &raw, ViewDetail::Full)?))
    }
}
