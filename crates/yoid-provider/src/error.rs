use yoid_core::ErrorClass;

/// Provider-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("invalid provider url: {0}")]
    InvalidUrl(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ProviderError {
    /// Classify this error for batch processing.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound(_) | Self::InvalidUrl(_) => ErrorClass::Configuration,
            Self::Serialization(_) => ErrorClass::Internal,
            _ => ErrorClass::Transient,
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
