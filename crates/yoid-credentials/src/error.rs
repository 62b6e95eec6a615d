use yoid_core::{CoreError, ErrorClass};
use yoid_provider::ProviderError;

/// Credential metadata errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("schema not found: {0}")]
    SchemaNotFound(String),

    #[error("schema already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("data inconsistency: {0}")]
    DataInconsistency(String),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl CredentialError {
    /// Classify this error for batch processing.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::SchemaNotFound(_)
            | Self::AlreadyExists(_)
            | Self::InvalidArgument(_)
            | Self::Configuration(_) => ErrorClass::Configuration,
            Self::DataInconsistency(_) => ErrorClass::DataInconsistency,
            Self::Core(e) => e.class(),
            Self::Provider(e) => e.class(),
        }
    }
}
