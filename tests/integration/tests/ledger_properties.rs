//! Integration test: ledger invariants through the public pipeline wiring.
//!
//! One record per key, identifiers required on success, and the retry law
//! as driven by real scheduler runs against a failing provider.

use std::collections::HashSet;

use yoid_core::{IssuanceStatus, PipelineConfig, TenantStatus};
use yoid_integration_tests::{Pipeline, LEARNING_SCHEMA, YOID_SCHEMA};
use yoid_ledger::{LedgerError, TenantEntity};
use yoid_pipeline::OutcomeKind;

// =========================================================================
// One record per key
// =========================================================================

#[tokio::test]
async fn test_schedule_creation_twice_keeps_one_record() {
    let p = Pipeline::new().await;
    let user = p.onboard_user("ada@example.org").await;
    let entity = TenantEntity::User(user.id);

    let first = p.tenants.get(entity).await.unwrap().unwrap();
    let again = p.tenants.schedule_creation(entity).await.unwrap();
    assert_eq!(again.id, first.id);

    // Issuer organization plus the user.
    let pending = p
        .tenants
        .list_pending_creation(100, &HashSet::new())
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);
}

#[tokio::test]
async fn test_schedule_issuance_twice_is_already_exists() {
    let p = Pipeline::new().await;
    let user = p.onboard_user("ada@example.org").await;
    let opportunity = p.publish_opportunity(&p.issuer, Some(LEARNING_SCHEMA)).await;
    let completion = p.complete(&user, &opportunity).await;

    p.credentials
        .schedule_issuance(LEARNING_SCHEMA, completion.id)
        .await
        .unwrap();
    let err = p
        .credentials
        .schedule_issuance(LEARNING_SCHEMA, completion.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyExists(_)));

    let pending = p
        .credentials
        .list_pending_issuance(100, &HashSet::new())
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn test_one_yoid_credential_per_user() {
    let p = Pipeline::new().await;
    let ada = p.onboard_user("ada@example.org").await;
    let grace = p.onboard_user("grace@example.org").await;
    for user in [&ada, &grace] {
        p.credentials
            .schedule_issuance(YOID_SCHEMA, user.id)
            .await
            .unwrap();
    }
    let err = p
        .credentials
        .schedule_issuance(YOID_SCHEMA, ada.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyExists(_)));

    let pending = p
        .credentials
        .list_pending_issuance(100, &HashSet::new())
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);
}

// =========================================================================
// Success requires the external identifier
// =========================================================================

#[tokio::test]
async fn test_created_without_tenant_id_is_rejected() {
    let p = Pipeline::new().await;
    let user = p.onboard_user("ada@example.org").await;
    let record = p.tenants.get(TenantEntity::User(user.id)).await.unwrap().unwrap();

    let mut outcome = record.clone();
    outcome.status = TenantStatus::Created;
    let err = p.tenants.update_creation(&outcome).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidUpdate(_)));

    let unchanged = p.tenants.get(TenantEntity::User(user.id)).await.unwrap().unwrap();
    assert_eq!(unchanged.status, TenantStatus::Pending);
    assert!(unchanged.tenant_id.is_none());
}

#[tokio::test]
async fn test_issued_without_credential_id_is_rejected() {
    let p = Pipeline::new().await;
    let user = p.onboard_user("ada@example.org").await;
    let record = p
        .credentials
        .schedule_issuance(YOID_SCHEMA, user.id)
        .await
        .unwrap();

    let mut outcome = record.clone();
    outcome.status = IssuanceStatus::Issued;
    outcome.credential_id = Some("   ".into());
    assert!(matches!(
        p.credentials.update_issuance(&outcome).await.unwrap_err(),
        LedgerError::InvalidUpdate(_)
    ));
    assert_eq!(
        p.credentials.get(record.id).await.unwrap().unwrap().status,
        IssuanceStatus::Pending
    );
}

// =========================================================================
// Retry law
// =========================================================================

#[tokio::test]
async fn test_tenant_retry_law_under_outage() {
    let config = PipelineConfig {
        max_retry_attempts: 3,
        ..PipelineConfig::default()
    };
    let p = Pipeline::with_config(config).await;
    let user = p.onboard_user("ada@example.org").await;
    p.provider.set_unavailable(true);

    for expected in 1..=3u32 {
        let report = p.scheduler.process_tenant_creation().await.unwrap();
        assert_eq!(report.failed(), 2);
        let record = p.tenants.get(TenantEntity::User(user.id)).await.unwrap().unwrap();
        assert_eq!(record.retry_count, Some(expected));
        let expected_status = if expected < 3 {
            TenantStatus::Pending
        } else {
            TenantStatus::Error
        };
        assert_eq!(record.status, expected_status);
        assert!(record.error_reason.as_deref().unwrap().contains("unavailable"));
    }

    // Given up: nothing left to attempt, even once the provider recovers.
    p.provider.set_unavailable(false);
    let report = p.scheduler.process_tenant_creation().await.unwrap();
    assert!(report.outcomes.is_empty());
    assert_eq!(p.provider.tenant_count(), 0);
}

#[tokio::test]
async fn test_issuance_retry_law_counts_first_failure_as_attempt() {
    let config = PipelineConfig {
        max_retry_attempts: 1,
        ..PipelineConfig::default()
    };
    let p = Pipeline::with_config(config).await;
    let user = p.onboard_user("ada@example.org").await;
    p.provision_tenants().await;
    let record = p
        .credentials
        .schedule_issuance(YOID_SCHEMA, user.id)
        .await
        .unwrap();
    p.provider.fail_issuance(YOID_SCHEMA, "quota exceeded");

    let mut seen = Vec::new();
    for _ in 0..3 {
        let report = p.scheduler.process_credential_issuance().await.unwrap();
        match &report.outcome_for(record.id).unwrap().kind {
            OutcomeKind::Failed {
                retry_count,
                gave_up,
                ..
            } => seen.push((*retry_count, *gave_up)),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(seen, vec![(Some(0), false), (Some(1), false), (Some(2), true)]);

    let stored = p.credentials.get(record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, IssuanceStatus::Error);
    assert_eq!(stored.error_reason.as_deref(), Some("request rejected: quota exceeded"));
}

#[tokio::test]
async fn test_recovery_clears_error_fields() {
    let p = Pipeline::new().await;
    let user = p.onboard_user("ada@example.org").await;
    p.provider.fail_tenant(user.id.to_string(), "tenant quota");

    let report = p.scheduler.process_tenant_creation().await.unwrap();
    assert_eq!(report.completed(), 1);
    assert_eq!(report.failed(), 1);

    p.provider.clear_failures();
    let report = p.scheduler.process_tenant_creation().await.unwrap();
    assert_eq!(report.completed(), 1);

    let record = p.tenants.get(TenantEntity::User(user.id)).await.unwrap().unwrap();
    assert_eq!(record.status, TenantStatus::Created);
    assert!(record.tenant_id.is_some());
    assert!(record.error_reason.is_none());
    assert!(record.retry_count.is_none());
}
