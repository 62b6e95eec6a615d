//! Minimal read models of the domain records the pipeline draws from.
//!
//! These are projections owned by the surrounding application; the pipeline
//! only reads them, either to build tenant requests or as attribute sources
//! for credential issuance.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A reference-list entry (skill, country, language, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lookup {
    pub id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
}

impl Lookup {
    /// Create a named lookup entry with a fresh id.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: Some(name.into()),
        }
    }
}

/// User projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub date_yoid_onboarded: Option<DateTime<Utc>>,
    #[serde(default)]
    pub skills: Vec<Lookup>,
    /// Name of the organization that issues the user's YoID credential.
    #[serde(default)]
    pub yoid_issuer_name: Option<String>,
    /// Logo of the organization that issues the user's YoID credential.
    #[serde(default)]
    pub yoid_issuer_logo_url: Option<String>,
}

impl User {
    /// Create a user with only the mandatory fields populated.
    pub fn new(id: Uuid, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            first_name: None,
            surname: None,
            display_name: None,
            phone_number: None,
            country: None,
            date_of_birth: None,
            photo_url: None,
            date_yoid_onboarded: None,
            skills: Vec::new(),
            yoid_issuer_name: None,
            yoid_issuer_logo_url: None,
        }
    }

    /// Name shown for the user's tenant: display name, then full name, then email.
    pub fn tenant_display_name(&self) -> String {
        if let Some(name) = self.display_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.trim().to_string();
        }
        let full = [self.first_name.as_deref(), self.surname.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if full.is_empty() {
            self.email.clone()
        } else {
            full
        }
    }
}

/// Organization projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub logo_url: Option<String>,
}

/// Opportunity projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub type_name: Option<String>,
    pub organization_id: Uuid,
    pub organization_name: String,
    #[serde(default)]
    pub organization_logo_url: Option<String>,
    /// Full name of the credential schema issued on completion, if any.
    #[serde(default)]
    pub ssi_schema_name: Option<String>,
    #[serde(default)]
    pub zlto_reward: Option<f64>,
    #[serde(default)]
    pub date_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub skills: Vec<Lookup>,
    #[serde(default)]
    pub countries: Vec<Lookup>,
    #[serde(default)]
    pub languages: Vec<Lookup>,
}

/// A user's verified completion of an opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityCompletion {
    pub id: Uuid,
    pub user_id: Uuid,
    pub opportunity_id: Uuid,
    #[serde(default)]
    pub date_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_completed: Option<DateTime<Utc>>,
}
