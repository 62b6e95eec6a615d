//! YoID Provider: The seam to the external identity/credential provider.
//!
//! The provider hosts tenants, credential schemas, and issued credentials.
//! The pipeline treats it as an opaque remote service behind [`SsiProvider`].

pub mod adapters;
pub mod error;
pub mod traits;
pub mod types;

pub use adapters::http::{HttpProvider, HttpProviderConfig};
pub use adapters::memory::InMemoryProvider;
pub use error::ProviderError;
pub use traits::SsiProvider;
pub use types::{
    CredentialIssuanceRequest, ProviderSchema, RawCredential, SchemaUpsertRequest, TenantRequest,
};
