use std::fmt;

/// How a failure is treated by the batch scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorClass {
    /// Metadata or wiring is wrong (unknown path, missing prerequisite ids).
    /// Retrying will not help; the record is left for an operator.
    Configuration,
    /// The external provider failed. Recorded on the ledger and retried.
    Transient,
    /// Provider schema state and internal metadata disagree.
    DataInconsistency,
    /// Storage or directory failure inside this process.
    Internal,
}

impl ErrorClass {
    /// Whether the failure should be written to the ledger as a retryable error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Transient => write!(f, "Transient"),
            Self::DataInconsistency => write!(f, "DataInconsistency"),
            Self::Internal => write!(f, "Internal"),
        }
    }
}

/// Core errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid status transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid schema name '{0}': expected '<Type>|<Name>'")]
    InvalidSchemaName(String),

    #[error("unknown schema type: {0}")]
    UnknownSchemaType(String),

    #[error("unknown value: {0}")]
    UnknownValue(String),
}

impl CoreError {
    /// Classify this error for batch processing.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidStateTransition { .. } => ErrorClass::Internal,
            _ => ErrorClass::Configuration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(ErrorClass::Transient.is_transient());
        assert!(!ErrorClass::Configuration.is_transient());
        assert!(!ErrorClass::DataInconsistency.is_transient());
        assert!(!ErrorClass::Internal.is_transient());
    }

    #[test]
    fn test_core_error_class() {
        let err = CoreError::MissingField("tenant_id".into());
        assert_eq!(err.class(), ErrorClass::Configuration);
        let err = CoreError::InvalidStateTransition {
            from: "Created".into(),
            to: "Pending".into(),
        };
        assert_eq!(err.class(), ErrorClass::Internal);
    }
}
