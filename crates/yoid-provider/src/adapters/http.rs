use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ProviderError;
use crate::traits::SsiProvider;
use crate::types::{
    CredentialIssuanceRequest, ProviderSchema, RawCredential, SchemaUpsertRequest, TenantRequest,
};

/// Connection settings for a hosted provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpProviderConfig {
    /// Base URL of the provider API, without a trailing slash.
    pub base_url: String,
    /// API key sent in the `X-API-Key` header.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8100".into(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TenantResponse {
    tenant_id: String,
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    credential_id: String,
}

/// Provider reached over HTTP with JSON bodies.
pub struct HttpProvider {
    client: Client,
    config: HttpProviderConfig,
}

impl HttpProvider {
    /// Build a provider client. Fails if the HTTP client cannot be constructed.
    pub fn new(config: HttpProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Endpoint URL under the base URL. Each segment is percent-encoded as a
    /// single path segment, so ids cannot escape their tenant's path.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        if let Some(bad) = segments
            .iter()
            .find(|s| s.is_empty() || **s == "." || **s == "..")
        {
            return Err(ProviderError::InvalidUrl(format!(
                "path segment '{}' is not allowed",
                bad
            )));
        }
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| ProviderError::InvalidUrl(format!("{}: {}", self.config.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::InvalidUrl(format!("{} cannot be a base", self.config.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.config.api_key {
            Some(ref key) => builder.header("X-API-Key", key),
            None => builder,
        }
    }

    /// Send a request and decode a JSON body; `Ok(None)` on 404.
    async fn send_optional<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<Option<T>, ProviderError> {
        let response = self.authorize(builder).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), message = %message, "provider call failed");
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let body = response.bytes().await?;
        Ok(Some(serde_json::from_slice(&body)?))
    }

    /// Send a request and decode a JSON body; 404 is an error.
    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<T, ProviderError> {
        self.send_optional(builder)
            .await?
            .ok_or_else(|| ProviderError::NotFound(what.to_string()))
    }
}

#[async_trait]
impl SsiProvider for HttpProvider {
    async fn ensure_tenant(&self, request: TenantRequest) -> Result<String, ProviderError> {
        let builder = self.client.post(self.endpoint(&["tenants"])?).json(&request);
        let response: TenantResponse = self.send(builder, "tenants").await?;
        Ok(response.tenant_id)
    }

    async fn get_schema_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ProviderSchema>, ProviderError> {
        let builder = self
            .client
            .get(self.endpoint(&["schemas", "by-name"])?)
            .query(&[("name", name)]);
        self.send_optional(builder).await
    }

    async fn list_schemas(&self) -> Result<Vec<ProviderSchema>, ProviderError> {
        let builder = self.client.get(self.endpoint(&["schemas"])?);
        self.send(builder, "schemas").await
    }

    async fn upsert_schema(
        &self,
        request: SchemaUpsertRequest,
    ) -> Result<ProviderSchema, ProviderError> {
        let builder = self.client.put(self.endpoint(&["schemas"])?).json(&request);
        self.send(builder, "schemas").await
    }

    async fn get_credential_by_id(
        &self,
        tenant_id: &str,
        credential_id: &str,
    ) -> Result<Option<RawCredential>, ProviderError> {
        let url = self.endpoint(&["tenants", tenant_id, "credentials", credential_id])?;
        self.send_optional(self.client.get(url)).await
    }

    async fn list_credentials(
        &self,
        tenant_id: &str,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Vec<RawCredential>, ProviderError> {
        let url = self.endpoint(&["tenants", tenant_id, "credentials"])?;
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(page) = page {
            query.push(("page", page.to_string()));
        }
        if let Some(size) = page_size {
            query.push(("page_size", size.to_string()));
        }
        let builder = self.client.get(url).query(&query);
        Ok(self.send_optional(builder).await?.unwrap_or_default())
    }

    async fn issue_credential(
        &self,
        request: CredentialIssuanceRequest,
    ) -> Result<String, ProviderError> {
        let builder = self.client.post(self.endpoint(&["credentials"])?).json(&request);
        let response: IssueResponse = self.send(builder, "credentials").await?;
        tracing::info!(
            credential_id = %response.credential_id,
            schema = %request.schema_name,
            "credential issued by provider"
        );
        Ok(response.credential_id)
    }

    fn provider_id(&self) -> &str {
        "ssi-http"
    }
}
