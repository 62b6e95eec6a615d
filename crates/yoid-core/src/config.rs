use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::status::RetryPolicy;

/// Configuration consumed by the ledgers and the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum retry attempts for failed provider calls (0 = unlimited).
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    /// Tenant-creation job settings.
    #[serde(default)]
    pub tenant_creation: JobConfig,
    /// Credential-issuance job settings.
    #[serde(default)]
    pub credential_issuance: JobConfig,
    /// YoID credential settings.
    #[serde(default)]
    pub yoid: YoidConfig,
}

/// Settings for one batch job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Records pulled per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Wall-clock time box of a single run, in hours.
    #[serde(default = "default_max_run_hours")]
    pub max_run_hours: u32,
    /// Seconds between scheduled runs.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

/// Settings for the per-user YoID credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoidConfig {
    /// Full name of the YoID schema scheduled on user onboarding.
    #[serde(default = "default_yoid_schema_name")]
    pub schema_name: String,
    /// Organization whose tenant issues YoID credentials.
    #[serde(default)]
    pub issuer_organization_id: Option<Uuid>,
}

fn default_max_retry_attempts() -> u32 {
    5
}
fn default_batch_size() -> usize {
    500
}
fn default_max_run_hours() -> u32 {
    2
}
fn default_interval_secs() -> u64 {
    300
}
fn default_yoid_schema_name() -> String {
    "YoID|Default".into()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: default_max_retry_attempts(),
            tenant_creation: JobConfig::default(),
            credential_issuance: JobConfig::default(),
            yoid: YoidConfig::default(),
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_run_hours: default_max_run_hours(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for YoidConfig {
    fn default() -> Self {
        Self {
            schema_name: default_yoid_schema_name(),
            issuer_organization_id: None,
        }
    }
}

impl PipelineConfig {
    /// Retry policy for the tenant ledger.
    pub fn tenant_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::tenant_creation(self.max_retry_attempts)
    }

    /// Retry policy for the credential ledger.
    pub fn issuance_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::credential_issuance(self.max_retry_attempts)
    }

    /// Reject settings that would make a job run without doing anything.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.tenant_creation.validate("tenant_creation")?;
        self.credential_issuance.validate("credential_issuance")?;
        Ok(())
    }
}

impl JobConfig {
    /// A batch size of zero would pull nothing on every run.
    pub fn validate(&self, job: &str) -> Result<(), CoreError> {
        if self.batch_size == 0 {
            return Err(CoreError::ValidationError(format!(
                "{}.batch_size must be at least 1",
                job
            )));
        }
        Ok(())
    }
}
