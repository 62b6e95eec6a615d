use yoid_core::{CoreError, ErrorClass};
use yoid_credentials::CredentialError;

/// Ledger-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    #[error("tenant not provisioned: {0}")]
    TenantNotProvisioned(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
}

impl LedgerError {
    /// Classify this error for batch processing.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::AlreadyExists(_) | Self::TenantNotProvisioned(_) => ErrorClass::Configuration,
            Self::NotFound(_) | Self::InvalidUpdate(_) | Self::Storage(_) => ErrorClass::Internal,
            Self::Core(e) => e.class(),
            Self::Credential(e) => e.class(),
        }
    }
}
