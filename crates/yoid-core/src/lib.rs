//! YoID Core: Shared types, domain read models, ledger statuses, and
//! configuration for the SSI tenant-provisioning and credential-issuance
//! pipeline.

pub mod config;
pub mod domain;
pub mod error;
pub mod status;
pub mod types;

pub use config::{JobConfig, PipelineConfig, YoidConfig};
pub use domain::{ActivityCompletion, Lookup, Opportunity, Organization, User};
pub use error::{CoreError, ErrorClass};
pub use status::{
    IssuanceStatus, LedgerStatus, RetryConvention, RetryDecision, RetryPolicy, TenantStatus,
};
pub use types::{
    ArtifactType, EntityType, SchemaType, SourceTag, SystemRole, TenantRole, ValueKind,
    SCHEMA_NAME_SEPARATOR,
};
