use yoid_core::{CoreError, ErrorClass};
use yoid_credentials::CredentialError;
use yoid_ledger::LedgerError;
use yoid_provider::ProviderError;

/// Pipeline-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("missing prerequisite: {0}")]
    MissingPrerequisite(String),

    #[error("directory error: {0}")]
    Directory(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl PipelineError {
    /// Classify this error for batch processing.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingPrerequisite(_) => ErrorClass::Configuration,
            Self::Directory(_) => ErrorClass::Internal,
            Self::Ledger(e) => e.class(),
            Self::Credential(e) => e.class(),
            Self::Provider(e) => e.class(),
            Self::Core(e) => e.class(),
        }
    }
}
