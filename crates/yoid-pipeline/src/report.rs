use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use yoid_core::ErrorClass;

/// The two batch jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    TenantCreation,
    CredentialIssuance,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TenantCreation => write!(f, "TenantCreation"),
            Self::CredentialIssuance => write!(f, "CredentialIssuance"),
        }
    }
}

/// What happened to one record during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome")]
pub enum OutcomeKind {
    /// Provider call succeeded; the ledger holds the returned id.
    Completed { external_id: String },
    /// Provider failure written to the ledger.
    Failed {
        reason: String,
        class: ErrorClass,
        retry_count: Option<u32>,
        gave_up: bool,
    },
    /// Record left untouched for an operator.
    Unresolved { reason: String, class: ErrorClass },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub record_id: Uuid,
    /// Human-readable subject (entity key or schema and link).
    pub subject: String,
    #[serde(flatten)]
    pub kind: OutcomeKind,
}

impl ItemOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self.kind, OutcomeKind::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.kind, OutcomeKind::Failed { .. })
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self.kind, OutcomeKind::Unresolved { .. })
    }
}

/// Summary of a single scheduler run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub job: JobKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub batches: u32,
    /// The run stopped because its time box ran out.
    pub deadline_reached: bool,
    pub outcomes: Vec<ItemOutcome>,
}

impl RunReport {
    pub fn start(job: JobKind) -> Self {
        Self {
            job,
            started_at: Utc::now(),
            finished_at: None,
            batches: 0,
            deadline_reached: false,
            outcomes: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_completed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn unresolved(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_unresolved()).count()
    }

    /// Outcome for a record, if it was attempted in this run.
    pub fn outcome_for(&self, record_id: Uuid) -> Option<&ItemOutcome> {
        self.outcomes.iter().find(|o| o.record_id == record_id)
    }
}
