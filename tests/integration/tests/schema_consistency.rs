//! Integration test: provider schema state against the entity catalog, and
//! attribute resolution over real domain records.

use uuid::Uuid;

use yoid_core::{ArtifactType, ErrorClass, Lookup, SchemaType};
use yoid_credentials::{CredentialError, SchemaRequest, SourceRecord};
use yoid_integration_tests::{Pipeline, LEARNING_SCHEMA};
use yoid_provider::ProviderSchema;

fn provider_schema(name: &str, attributes: &[&str]) -> ProviderSchema {
    ProviderSchema {
        id: format!("{name}:1.0"),
        name: name.into(),
        version: "1.0".into(),
        artifact_type: ArtifactType::Indy,
        attribute_names: attributes.iter().map(|a| a.to_string()).collect(),
    }
}

// =========================================================================
// Registry consistency
// =========================================================================

#[tokio::test]
async fn test_unmatched_provider_attribute_is_data_inconsistency() {
    let p = Pipeline::new().await;
    p.provider.put_schema(provider_schema(
        "Opportunity|Drifted",
        &[
            "Opportunity_Title",
            "Opportunity_OrganizationName",
            "Opportunity_OrganizationLogoURL",
            "Legacy_Attribute",
        ],
    ));

    let err = p.schemas.get_by_name("Opportunity|Drifted").await.unwrap_err();
    assert!(matches!(err, CredentialError::DataInconsistency(_)));
    assert_eq!(err.class(), ErrorClass::DataInconsistency);
}

#[tokio::test]
async fn test_cross_type_attribute_is_data_inconsistency() {
    let p = Pipeline::new().await;
    p.provider.put_schema(provider_schema(
        "YoID|Leaky",
        &[
            "YoID_Title",
            "YoID_Issuer",
            "YoID_IssuerLogoURL",
            "Opportunity_Title",
        ],
    ));

    let err = p.schemas.get_by_name("YoID|Leaky").await.unwrap_err();
    assert!(matches!(err, CredentialError::DataInconsistency(_)));
}

#[tokio::test]
async fn test_update_bumps_version_and_keeps_attributes() {
    let p = Pipeline::new().await;
    let before = p.schemas.get_by_name(LEARNING_SCHEMA).await.unwrap();

    let after = p
        .schemas
        .update(SchemaRequest {
            schema_type: SchemaType::Opportunity,
            artifact_type: ArtifactType::Indy,
            name: "Learning".into(),
            attributes: vec![
                "Opportunity_Skills".into(),
                "MyOpportunity_DateCompleted".into(),
                "User_Email".into(),
                "User_Country".into(),
            ],
        })
        .await
        .unwrap();
    assert_ne!(after.version, before.version);
    assert_eq!(after.attribute_count(), before.attribute_count() + 1);

    let err = p
        .schemas
        .update(SchemaRequest {
            schema_type: SchemaType::Opportunity,
            artifact_type: ArtifactType::Indy,
            name: "Learning".into(),
            attributes: vec!["User_Email".into()],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CredentialError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_list_by_type_skips_foreign_schemas() {
    let p = Pipeline::new().await;
    p.provider
        .put_schema(provider_schema("legacy-badge", &["anything"]));

    let all = p.schemas.list(None).await.unwrap();
    assert_eq!(all.len(), 2);
    let yoid = p.schemas.list(Some(SchemaType::YoId)).await.unwrap();
    assert_eq!(yoid.len(), 1);
    assert_eq!(yoid[0].full_name, "YoID|Default");
}

// =========================================================================
// Attribute resolution
// =========================================================================

#[tokio::test]
async fn test_list_path_skips_missing_names() {
    let p = Pipeline::new().await;
    let org = p.organization("Rustaceans");
    let mut opportunity = p.publish_opportunity(&org, Some(LEARNING_SCHEMA)).await;
    opportunity.skills = vec![
        Lookup::named("Coding"),
        Lookup {
            id: Uuid::now_v7(),
            name: None,
        },
        Lookup::named("Writing"),
    ];

    let schema = p.schemas.get_by_name(LEARNING_SCHEMA).await.unwrap();
    let entity = schema
        .entities
        .iter()
        .find(|e| e.name == "Opportunity")
        .unwrap();
    let catalog = p.schemas.catalog();
    let resolver = catalog.resolver();

    let first = resolver
        .resolve(entity, SourceRecord::Opportunity(&opportunity))
        .unwrap();
    assert_eq!(first["Opportunity_Skills"], "Coding, Writing");
    assert_eq!(first["Opportunity_OrganizationLogoURL"], "n/a");

    // Same inputs, same map.
    let second = resolver
        .resolve(entity, SourceRecord::Opportunity(&opportunity))
        .unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_resolver_rejects_wrong_source() {
    let p = Pipeline::new().await;
    let user = p.onboard_user("ada@example.org").await;
    let schema = p.schemas.get_by_name(LEARNING_SCHEMA).await.unwrap();
    let entity = schema
        .entities
        .iter()
        .find(|e| e.name == "Opportunity")
        .unwrap();

    let err = p
        .schemas
        .catalog()
        .resolver()
        .resolve(entity, SourceRecord::User(&user))
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Configuration);
}
