//! Integration test: onboarding through issuance to the wallet.
//!
//! Drives both scheduler jobs against the in-memory provider and reads the
//! issued credentials back through the wallet reader.

use chrono::Duration;
use std::collections::HashSet;
use std::sync::Arc;

use yoid_core::{ErrorClass, IssuanceStatus, PipelineConfig, SchemaType};
use yoid_credentials::CredentialError;
use yoid_integration_tests::{Pipeline, LEARNING_SCHEMA, YOID_SCHEMA};
use yoid_ledger::TenantEntity;
use yoid_pipeline::{CredentialFilter, OutcomeKind, PipelineError};
use yoid_provider::RawCredential;

// =========================================================================
// Happy path
// =========================================================================

#[tokio::test]
async fn test_full_flow_lands_in_wallet() {
    let p = Pipeline::new().await;
    let user = p.onboard_user("ada@example.org").await;
    let org = p.approve_organization(p.organization("Rustaceans")).await;
    let opportunity = p.publish_opportunity(&org, Some(LEARNING_SCHEMA)).await;
    let completion = p.complete(&user, &opportunity).await;

    p.provision_tenants().await;
    let holder = p.tenants.get_tenant_id(TenantEntity::User(user.id)).await.unwrap();
    let issuer = p
        .tenants
        .get_tenant_id(TenantEntity::Organization(org.id))
        .await
        .unwrap();
    assert_ne!(holder, issuer);

    let yoid = p
        .credentials
        .schedule_issuance(YOID_SCHEMA, user.id)
        .await
        .unwrap();
    let learning = p
        .credentials
        .schedule_issuance(LEARNING_SCHEMA, completion.id)
        .await
        .unwrap();

    let report = p.scheduler.process_credential_issuance().await.unwrap();
    assert_eq!(report.completed(), 2, "{report:?}");

    let learning = p.credentials.get(learning.id).await.unwrap().unwrap();
    assert_eq!(learning.status, IssuanceStatus::Issued);
    let credential_id = learning.credential_id.clone().unwrap();

    let request = p.provider.issuance_request(&credential_id).unwrap();
    assert_eq!(request.client_referent, learning.id.to_string());
    assert_eq!(request.issuer_tenant_id, issuer);
    assert_eq!(request.holder_tenant_id, holder);
    assert_eq!(request.attributes["Opportunity_Skills"], "Coding, Writing");
    assert_eq!(request.attributes["Opportunity_Title"], "Intro to Rust");

    let yoid = p.credentials.get(yoid.id).await.unwrap().unwrap();
    let yoid_request = p
        .provider
        .issuance_request(yoid.credential_id.as_deref().unwrap())
        .unwrap();
    assert_eq!(yoid_request.attributes["YoID_Title"], "Ada Lovelace");
    assert_eq!(yoid_request.attributes["YoID_Issuer"], "Yoma");

    // Wallet: summaries, type filter, and the full view.
    let all = p
        .wallet
        .search_user_credentials(user.id, &CredentialFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let only_learning = p
        .wallet
        .search_user_credentials(
            user.id,
            &CredentialFilter {
                schema_type: Some(SchemaType::Opportunity),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(only_learning.len(), 1);
    assert_eq!(only_learning[0].title.as_deref(), Some("Intro to Rust"));
    assert_eq!(only_learning[0].issuer.as_deref(), Some("Rustaceans"));
    assert!(only_learning[0].attributes.is_empty());

    let full = p
        .wallet
        .get_credential_by_id(user.id, &credential_id)
        .await
        .unwrap()
        .unwrap();
    let rendered: Vec<(&str, &str)> = full
        .attributes
        .iter()
        .map(|a| (a.display_name.as_str(), a.value.as_str()))
        .collect();
    assert_eq!(
        rendered,
        vec![
            ("Date Completed", "2024-05-17"),
            ("Email", "ada@example.org"),
            ("Skills", "Coding, Writing"),
        ]
    );
}

#[tokio::test]
async fn test_users_provisioned_before_organizations() {
    let p = Pipeline::new().await;
    let user = p.onboard_user("ada@example.org").await;
    let report = p.scheduler.process_tenant_creation().await.unwrap();

    // Users go first within a batch.
    let order: Vec<&str> = report.outcomes.iter().map(|o| o.subject.as_str()).collect();
    assert!(order[0].starts_with("User"));
    assert!(order[1].starts_with("Organization"));

    assert!(p.provider.tenant_id_for(&user.id.to_string()).is_some());
    assert!(p.provider.tenant_id_for(&p.issuer.id.to_string()).is_some());
}

// =========================================================================
// Per-item isolation
// =========================================================================

#[tokio::test]
async fn test_opportunity_without_schema_fails_only_its_item() {
    let p = Pipeline::new().await;
    let user = p.onboard_user("ada@example.org").await;
    let org = p.approve_organization(p.organization("Rustaceans")).await;
    p.provision_tenants().await;

    // The opportunity lost its schema assignment after the record was queued.
    let orphan_opportunity = p.publish_opportunity(&org, None).await;
    let orphan_completion = p.complete(&user, &orphan_opportunity).await;
    let orphan = p
        .credentials
        .schedule_issuance(LEARNING_SCHEMA, orphan_completion.id)
        .await
        .unwrap();

    let good_opportunity = p.publish_opportunity(&org, Some(LEARNING_SCHEMA)).await;
    let good_completion = p.complete(&user, &good_opportunity).await;
    let good = p
        .credentials
        .schedule_issuance(LEARNING_SCHEMA, good_completion.id)
        .await
        .unwrap();

    let report = p.scheduler.process_credential_issuance().await.unwrap();
    assert!(report.outcome_for(orphan.id).unwrap().is_unresolved());
    assert!(report.outcome_for(good.id).unwrap().is_completed());

    let orphan = p.credentials.get(orphan.id).await.unwrap().unwrap();
    assert_eq!(orphan.status, IssuanceStatus::Pending);
    assert!(orphan.retry_count.is_none());
    assert!(orphan.error_reason.is_none());
    assert_eq!(
        p.credentials.get(good.id).await.unwrap().unwrap().status,
        IssuanceStatus::Issued
    );
}

#[tokio::test]
async fn test_issuance_waits_for_tenants() {
    let p = Pipeline::new().await;
    let user = p.onboard_user("ada@example.org").await;
    let record = p
        .credentials
        .schedule_issuance(YOID_SCHEMA, user.id)
        .await
        .unwrap();

    let report = p.scheduler.process_credential_issuance().await.unwrap();
    match &report.outcome_for(record.id).unwrap().kind {
        OutcomeKind::Unresolved { class, reason } => {
            assert_eq!(*class, ErrorClass::Configuration);
            assert!(reason.contains("not provisioned"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    p.provision_tenants().await;
    let report = p.scheduler.process_credential_issuance().await.unwrap();
    assert!(report.outcome_for(record.id).unwrap().is_completed());
}

#[tokio::test]
async fn test_yoid_without_issuer_configuration_is_unresolved() {
    let p = Pipeline::new().await;
    let user = p.onboard_user("ada@example.org").await;
    p.provision_tenants().await;
    let record = p
        .credentials
        .schedule_issuance(YOID_SCHEMA, user.id)
        .await
        .unwrap();

    let mut config = p.config.clone();
    config.yoid.issuer_organization_id = None;
    let scheduler = yoid_pipeline::Scheduler::new(
        config,
        p.tenants.clone(),
        p.credentials.clone(),
        p.provider.clone(),
        p.directory.clone(),
    );
    let report = scheduler.process_credential_issuance().await.unwrap();
    assert!(report.outcome_for(record.id).unwrap().is_unresolved());
}

// =========================================================================
// Time box and batching
// =========================================================================

#[tokio::test]
async fn test_batches_until_drained() {
    let mut config = PipelineConfig::default();
    config.tenant_creation.batch_size = 2;
    let p = Pipeline::with_config(config).await;
    for i in 0..4 {
        p.onboard_user(&format!("user{i}@example.org")).await;
    }

    let report = p.scheduler.process_tenant_creation().await.unwrap();
    // Issuer plus four users, two per batch.
    assert_eq!(report.batches, 3);
    assert_eq!(report.completed(), 5);
    assert!(!report.deadline_reached);
    assert!(report.finished_at.unwrap() - report.started_at < Duration::minutes(1));
}

#[tokio::test]
async fn test_zero_hour_time_box_processes_nothing() {
    let mut config = PipelineConfig::default();
    config.tenant_creation.max_run_hours = 0;
    let p = Pipeline::with_config(config).await;
    p.onboard_user("ada@example.org").await;

    let report = p.scheduler.process_tenant_creation().await.unwrap();
    assert!(report.deadline_reached);
    assert!(report.outcomes.is_empty());
    let pending = p
        .tenants
        .list_pending_creation(10, &HashSet::new())
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);
}

#[tokio::test]
async fn test_concurrent_runs_are_serialized() {
    let p = Arc::new(Pipeline::new().await);
    for i in 0..10 {
        p.onboard_user(&format!("user{i}@example.org")).await;
    }

    let a = {
        let p = p.clone();
        tokio::spawn(async move { p.scheduler.process_tenant_creation().await.unwrap() })
    };
    let b = {
        let p = p.clone();
        tokio::spawn(async move { p.scheduler.process_tenant_creation().await.unwrap() })
    };
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    // Every record is provisioned exactly once across both runs.
    assert_eq!(a.completed() + b.completed(), 11);
    assert_eq!(p.provider.tenant_count(), 11);
}

// =========================================================================
// Wallet consistency
// =========================================================================

#[tokio::test]
async fn test_wallet_rejects_credential_missing_system_attribute() {
    let p = Pipeline::new().await;
    let user = p.onboard_user("ada@example.org").await;
    p.provision_tenants().await;
    let holder = p.tenants.get_tenant_id(TenantEntity::User(user.id)).await.unwrap();

    p.provider.put_credential(
        &holder,
        RawCredential {
            id: "broken".into(),
            schema_id: "YoID|Default:1.0".into(),
            schema_name: YOID_SCHEMA.into(),
            artifact_type: yoid_core::ArtifactType::Indy,
            date_issued: None,
            attributes: [
                ("YoID_Title".to_string(), "Ada Lovelace".to_string()),
                ("User_Email".to_string(), "ada@example.org".to_string()),
            ]
            .into_iter()
            .collect(),
        },
    );

    let err = p
        .wallet
        .get_credential_by_id(user.id, "broken")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Credential(CredentialError::DataInconsistency(_))
    ));
    assert_eq!(err.class(), ErrorClass::DataInconsistency);
}

#[tokio::test]
async fn test_wallet_of_unknown_user_is_empty() {
    let p = Pipeline::new().await;
    let views = p
        .wallet
        .search_user_credentials(uuid::Uuid::now_v7(), &CredentialFilter::default())
        .await
        .unwrap();
    assert!(views.is_empty());
}
