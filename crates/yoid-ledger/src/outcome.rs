use chrono::Utc;

use yoid_core::{LedgerStatus, RetryDecision, RetryPolicy};

use crate::error::LedgerError;
use crate::record::LedgerRecord;

/// Apply an outcome update to the stored `record`.
///
/// The stored record must be Pending. A success needs a non-empty external
/// id and clears the failure fields. An error needs a non-empty reason and
/// goes through `policy`: the record reverts to Pending unless it gives up.
/// Returns the retry decision for failures.
pub(crate) fn apply_outcome<R: LedgerRecord>(
    record: &mut R,
    outcome: &R,
    policy: &RetryPolicy,
) -> Result<Option<RetryDecision>, LedgerError> {
    let target = outcome.status();
    R::Status::check_outcome(record.status(), target)?;

    let decision = if target == R::Status::SUCCESS {
        let external_id = non_blank(outcome.external_id()).ok_or_else(|| {
            LedgerError::InvalidUpdate(format!(
                "record {} cannot be {} without a {}",
                record.id(),
                target,
                R::EXTERNAL_ID
            ))
        })?;
        record.mark_succeeded(external_id.to_string());
        None
    } else {
        let reason = non_blank(outcome.error_reason()).ok_or_else(|| {
            LedgerError::InvalidUpdate(format!(
                "record {} cannot fail without a reason",
                record.id()
            ))
        })?;
        let decision = policy.register_failure(record.retry_count());
        let status = if decision.give_up {
            R::Status::ERROR
        } else {
            R::Status::PENDING
        };
        record.mark_failed(reason.to_string(), decision.retry_count, status);
        Some(decision)
    };

    record.touch(Utc::now());
    Ok(decision)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
