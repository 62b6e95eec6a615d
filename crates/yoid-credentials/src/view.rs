//! Display models for issued credentials.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write;

use yoid_core::{ArtifactType, SchemaType, SystemRole, ValueKind};
use yoid_provider::RawCredential;

use crate::error::CredentialError;
use crate::resolver::NOT_AVAILABLE;
use crate::schema::SchemaDefinition;

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// How much of a credential to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewDetail {
    /// System fields only.
    Summary,
    /// System fields plus every other declared attribute.
    Full,
}

/// One rendered attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeView {
    pub name: String,
    pub display_name: String,
    pub value: String,
}

/// A credential as shown to its holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialView {
    pub id: String,
    pub schema_name: String,
    pub schema_type: SchemaType,
    pub artifact_type: ArtifactType,
    pub title: Option<String>,
    pub issuer: Option<String>,
    pub issuer_logo_url: Option<String>,
    pub date_issued: Option<DateTime<Utc>>,
    /// Non-system attributes sorted by display name; empty for summaries.
    #[serde(default)]
    pub attributes: Vec<AttributeView>,
}

/// Render a raw credential using its schema.
///
/// Every system attribute the schema declares must be present in the
/// credential; a missing one means the provider and the catalog disagree.
pub fn parse_credential(
    schema: &SchemaDefinition,
    raw: &RawCredential,
    detail: ViewDetail,
) -> Result<CredentialView, CredentialError> {
    let values: HashMap<String, &str> = raw
        .attributes
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.as_str()))
        .collect();

    let mut view = CredentialView {
        id: raw.id.clone(),
        schema_name: schema.full_name.clone(),
        schema_type: schema.schema_type,
        artifact_type: raw.artifact_type,
        title: None,
        issuer: None,
        issuer_logo_url: None,
        date_issued: raw.date_issued,
        attributes: Vec::new(),
    };

    for property in schema.properties().filter(|p| p.is_system()) {
        let value = values
            .get(&property.attribute_name.to_lowercase())
            .ok_or_else(|| {
                tracing::error!(
                    credential_id = %raw.id,
                    schema = %schema.full_name,
                    attribute = %property.attribute_name,
                    "credential is missing a system attribute"
                );
                CredentialError::DataInconsistency(format!(
                    "credential '{}' is missing system attribute '{}' of schema '{}'",
                    raw.id, property.attribute_name, schema.full_name
                ))
            })?;

        let rendered = format_value(value, property.value_kind, property.format.as_deref());
        let rendered = (rendered != NOT_AVAILABLE).then_some(rendered);
        match property.system_role {
            Some(SystemRole::Title) => view.title = rendered,
            Some(SystemRole::Issuer) => view.issuer = rendered,
            Some(SystemRole::IssuerLogoUrl) => view.issuer_logo_url = rendered,
            None => {}
        }
    }

    if detail == ViewDetail::Full {
        view.attributes = schema
            .properties()
            .filter(|p| !p.is_system())
            .map(|p| {
                let value = values
                    .get(&p.attribute_name.to_lowercase())
                    .copied()
                    .unwrap_or_default();
                AttributeView {
                    name: p.attribute_name.clone(),
                    display_name: p.display_name.clone(),
                    value: format_value(value, p.value_kind, p.format.as_deref()),
                }
            })
            .collect();
        view.attributes
            .sort_by(|a, b| a.display_name.to_lowercase().cmp(&b.display_name.to_lowercase()));
    }

    Ok(view)
}

/// Render an attribute value by its declared kind.
///
/// Empty values render as `n/a`; values that do not parse as their kind
/// are shown unchanged.
pub fn format_value(value: &str, kind: ValueKind, format: Option<&str>) -> String {
    let value = value.trim();
    if value.is_empty() || value == NOT_AVAILABLE {
        return NOT_AVAILABLE.to_string();
    }

    let rendered = match kind {
        ValueKind::String => None,
        ValueKind::Date => format_date(value, format.unwrap_or(DEFAULT_DATE_FORMAT)),
        ValueKind::Decimal | ValueKind::Float => format_number(value, format),
    };
    rendered.unwrap_or_else(|| value.to_string())
}

fn format_date(value: &str, pattern: &str) -> Option<String> {
    let mut out = String::new();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        write!(out, "{}", timestamp.with_timezone(&Utc).format(pattern)).ok()?;
    } else if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        write!(out, "{}", date.format(pattern)).ok()?;
    } else {
        return None;
    }
    Some(out)
}

fn format_number(value: &str, pattern: Option<&str>) -> Option<String> {
    let number: f64 = value.parse().ok()?;
    let precision = match pattern.map(str::trim) {
        None | Some("") => return Some(value.to_string()),
        Some(p) => match p.parse::<usize>() {
            Ok(digits) => digits,
            Err(_) => match p.split_once('.') {
                Some((_, fraction)) => fraction.chars().filter(|c| *c == '0' || *c == '#').count(),
                None => 0,
            },
        },
    };
    Some(format!("{:.*}", precision, number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EntityCatalog;
    use crate::schema::SchemaRegistry;
    use std::sync::Arc;
    use yoid_provider::{InMemoryProvider, ProviderSchema};

    fn schema() -> SchemaDefinition {
        let provider = Arc::new(InMemoryProvider::new());
        let catalog = Arc::new(EntityCatalog::builtin().unwrap());
        let registry = SchemaRegistry::new(provider, catalog);
        registry
            .parse(&ProviderSchema {
                id: "s1".into(),
                name: "Opportunity|Learning".into(),
                version: "1.0".into(),
                artifact_type: ArtifactType::Indy,
                attribute_names: vec![
                    "Opportunity_Title".into(),
                    "Opportunity_OrganizationName".into(),
                    "Opportunity_OrganizationLogoURL".into(),
                    "Opportunity_ZltoReward".into(),
                    "MyOpportunity_DateCompleted".into(),
                    "User_Email".into(),
                ],
            })
            .unwrap()
    }

    fn credential(pairs: &[(&str, &str)]) -> RawCredential {
        RawCredential {
            id: "cred-1".into(),
            schema_id: "s1".into(),
            schema_name: "Opportunity|Learning".into(),
            artifact_type: ArtifactType::Indy,
            date_issued: None,
            attributes: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn complete() -> RawCredential {
        credential(&[
            ("opportunity_title", "Intro to Rust"),
            ("Opportunity_OrganizationName", "Acme"),
            ("Opportunity_OrganizationLogoURL", "n/a"),
            ("Opportunity_ZltoReward", "12.5"),
            ("MyOpportunity_DateCompleted", "2024-03-01T10:00:00Z"),
            ("User_Email", "ada@example.org"),
            ("provider_internal_revocation_id", "42"),
        ])
    }

    #[test]
    fn test_summary_projects_system_fields() {
        let view = parse_credential(&schema(), &complete(), ViewDetail::Summary).unwrap();
        assert_eq!(view.title.as_deref(), Some("Intro to Rust"));
        assert_eq!(view.issuer.as_deref(), Some("Acme"));
        assert_eq!(view.issuer_logo_url, None);
        assert!(view.attributes.is_empty());
    }

    #[test]
    fn test_full_detail_sorted_and_formatted() {
        let view = parse_credential(&schema(), &complete(), ViewDetail::Full).unwrap();
        let names: Vec<&str> = view
            .attributes
            .iter()
            .map(|a| a.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["Date Completed", "Email", "Zlto Reward"]);
        assert_eq!(view.attributes[0].value, "2024-03-01");
        assert_eq!(view.attributes[2].value, "12.50");
        assert!(view
            .attributes
            .iter()
            .all(|a| a.name != "provider_internal_revocation_id"));
    }

    #[test]
    fn test_missing_system_attribute_is_data_inconsistency() {
        let raw = credential(&[
            ("Opportunity_Title", "Intro to Rust"),
            ("Opportunity_OrganizationLogoURL", "n/a"),
        ]);
        let err = parse_credential(&schema(), &raw, ViewDetail::Full).unwrap_err();
        assert!(matches!(err, CredentialError::DataInconsistency(_)));
    }

    #[test]
    fn test_missing_regular_attribute_renders_not_available() {
        let raw = credential(&[
            ("Opportunity_Title", "Intro to Rust"),
            ("Opportunity_OrganizationName", "Acme"),
            ("Opportunity_OrganizationLogoURL", "https://acme.test/logo.png"),
        ]);
        let view = parse_credential(&schema(), &raw, ViewDetail::Full).unwrap();
        assert!(view.attributes.iter().all(|a| a.value == NOT_AVAILABLE));
        assert_eq!(
            view.issuer_logo_url.as_deref(),
            Some("https://acme.test/logo.png")
        );
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value("", ValueKind::String, None), "n/a");
        assert_eq!(format_value("  ", ValueKind::Date, None), "n/a");
        assert_eq!(format_value("hello", ValueKind::String, Some("%Y")), "hello");
        assert_eq!(format_value("2024-03-01", ValueKind::Date, Some("%d/%m/%Y")), "01/03/2024");
        assert_eq!(format_value("2024-03-01T23:30:00Z", ValueKind::Date, None), "2024-03-01");
        assert_eq!(format_value("yesterday", ValueKind::Date, None), "yesterday");
        assert_eq!(format_value("3.14159", ValueKind::Float, Some("0.00")), "3.14");
        assert_eq!(format_value("3.14159", ValueKind::Float, Some("1")), "3.1");
        assert_eq!(format_value("7", ValueKind::Decimal, Some("0")), "7");
        assert_eq!(format_value("7.25", ValueKind::Decimal, None), "7.25");
        assert_eq!(format_value("lots", ValueKind::Decimal, Some("0.00")), "lots");
    }
}
