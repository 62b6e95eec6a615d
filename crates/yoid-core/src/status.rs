use std::fmt;

use crate::error::CoreError;

/// Status of a tenant-provisioning request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TenantStatus {
    /// Waiting for the scheduler.
    Pending,
    /// Tenant exists at the provider. Final state.
    Created,
    /// Provisioning failed and retries are exhausted (or a retry is queued
    /// when observed mid-update).
    Error,
}

/// Status of a credential-issuance request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum IssuanceStatus {
    /// Waiting for the scheduler.
    Pending,
    /// Credential issued by the provider. Final state.
    Issued,
    /// Issuance failed and retries are exhausted.
    Error,
}

/// Behaviour shared by the two ledger status enums.
///
/// Valid transitions:
/// - Pending → Success (Created / Issued)
/// - Pending → Error
/// - Error → Pending (retry, applied by the ledger itself)
pub trait LedgerStatus: Copy + Eq + fmt::Display + fmt::Debug + Send + Sync + 'static {
    /// The initial status.
    const PENDING: Self;
    /// The terminal success status.
    const SUCCESS: Self;
    /// The failure status.
    const ERROR: Self;

    /// Check that an outcome update from `current` to `target` is allowed.
    fn check_outcome(current: Self, target: Self) -> Result<(), CoreError> {
        if current != Self::PENDING || (target != Self::SUCCESS && target != Self::ERROR) {
            return Err(CoreError::InvalidStateTransition {
                from: current.to_string(),
                to: target.to_string(),
            });
        }
        Ok(())
    }

    /// Whether this is a final state for the scheduler.
    fn is_final(&self) -> bool {
        *self == Self::SUCCESS
    }
}

impl LedgerStatus for TenantStatus {
    const PENDING: Self = TenantStatus::Pending;
    const SUCCESS: Self = TenantStatus::Created;
    const ERROR: Self = TenantStatus::Error;
}

impl LedgerStatus for IssuanceStatus {
    const PENDING: Self = IssuanceStatus::Pending;
    const SUCCESS: Self = IssuanceStatus::Issued;
    const ERROR: Self = IssuanceStatus::Error;
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Created => write!(f, "Created"),
            Self::Error => write!(f, "Error"),
        }
    }
}

impl fmt::Display for IssuanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Issued => write!(f, "Issued"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// How consecutive failures are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RetryConvention {
    /// Every failure increments the counter (`None → 1 → 2 …`); the record
    /// gives up once the counter reaches the maximum.
    CountEveryFailure,
    /// The first failure is the original attempt, not a retry
    /// (`None → 0 → 1 …`); the record gives up once the counter exceeds the
    /// maximum.
    FirstFailureFree,
}

/// Result of registering one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// New value of the record's retry counter.
    pub retry_count: u32,
    /// Whether the record stays in Error instead of reverting to Pending.
    pub give_up: bool,
}

/// Retry limits for a ledger. A maximum of zero means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub convention: RetryConvention,
}

impl RetryPolicy {
    /// Policy used by the tenant ledger.
    pub fn tenant_creation(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            convention: RetryConvention::CountEveryFailure,
        }
    }

    /// Policy used by the credential ledger.
    pub fn credential_issuance(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            convention: RetryConvention::FirstFailureFree,
        }
    }

    /// Register a failure against the current counter.
    pub fn register_failure(&self, current: Option<u32>) -> RetryDecision {
        let unlimited = self.max_attempts == 0;
        let decision = match self.convention {
            RetryConvention::CountEveryFailure => {
                let retry_count = current.unwrap_or(0).saturating_add(1);
                RetryDecision {
                    retry_count,
                    give_up: !unlimited && retry_count >= self.max_attempts,
                }
            }
            RetryConvention::FirstFailureFree => {
                let retry_count = current.map_or(0, |c| c.saturating_add(1));
                RetryDecision {
                    retry_count,
                    give_up: !unlimited && retry_count > self.max_attempts,
                }
            }
        };

        tracing::debug!(
            convention = ?self.convention,
            max = self.max_attempts,
            retry_count = decision.retry_count,
            give_up = decision.give_up,
            "failure registered"
        );

        decision
    }
}
