use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Separator between the schema type and the display name in a full schema name.
pub const SCHEMA_NAME_SEPARATOR: char = '|';

/// Credential schema types known to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SchemaType {
    /// Issued when a user completes an opportunity.
    Opportunity,
    /// The user's digital identity credential, issued once per user.
    #[serde(rename = "YoID")]
    YoId,
}

impl SchemaType {
    /// All schema types.
    pub const ALL: [SchemaType; 2] = [SchemaType::Opportunity, SchemaType::YoId];

    /// Whether more than one schema of this type may be registered.
    pub fn supports_multiple(&self) -> bool {
        match self {
            Self::Opportunity => true,
            Self::YoId => false,
        }
    }

    /// Build a full schema name (`"{Type}|{DisplayName}"`).
    pub fn full_name(&self, display_name: &str) -> String {
        format!("{}{}{}", self, SCHEMA_NAME_SEPARATOR, display_name.trim())
    }

    /// Split a full schema name into its type and display name.
    pub fn parse_full_name(full_name: &str) -> Result<(SchemaType, &str), CoreError> {
        let (type_part, name_part) = full_name
            .split_once(SCHEMA_NAME_SEPARATOR)
            .ok_or_else(|| CoreError::InvalidSchemaName(full_name.to_string()))?;

        let name_part = name_part.trim();
        if name_part.is_empty() || name_part.contains(SCHEMA_NAME_SEPARATOR) {
            return Err(CoreError::InvalidSchemaName(full_name.to_string()));
        }

        let schema_type = type_part
            .trim()
            .parse::<SchemaType>()
            .map_err(|_| CoreError::InvalidSchemaName(full_name.to_string()))?;

        Ok((schema_type, name_part))
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opportunity => write!(f, "Opportunity"),
            Self::YoId => write!(f, "YoID"),
        }
    }
}

impl FromStr for SchemaType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SchemaType::ALL
            .into_iter()
            .find(|t| t.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownSchemaType(s.to_string()))
    }
}

/// Credential artifact format used by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ArtifactType {
    /// AnonCreds (Hyperledger Indy) credentials.
    #[default]
    Indy,
    /// W3C JSON-LD credentials with a linked-data proof.
    LdProof,
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Indy => write!(f, "Indy"),
            Self::LdProof => write!(f, "LdProof"),
        }
    }
}

/// The closed set of domain records a schema entity can draw attributes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceTag {
    User,
    Opportunity,
    ActivityCompletion,
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "User"),
            Self::Opportunity => write!(f, "Opportunity"),
            Self::ActivityCompletion => write!(f, "ActivityCompletion"),
        }
    }
}

/// Display-critical credential fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemRole {
    Title,
    Issuer,
    #[serde(rename = "IssuerLogoURL")]
    IssuerLogoUrl,
}

impl fmt::Display for SystemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Title => write!(f, "Title"),
            Self::Issuer => write!(f, "Issuer"),
            Self::IssuerLogoUrl => write!(f, "IssuerLogoURL"),
        }
    }
}

/// Declared kind of an attribute value, used when rendering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[default]
    String,
    Date,
    Decimal,
    Float,
}

/// Roles a tenant holds at the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TenantRole {
    Holder,
    Issuer,
    Verifier,
}

impl fmt::Display for TenantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Holder => write!(f, "Holder"),
            Self::Issuer => write!(f, "Issuer"),
            Self::Verifier => write!(f, "Verifier"),
        }
    }
}

/// Entities that own a tenant at the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    User,
    Organization,
}

impl EntityType {
    /// Fixed role set of a tenant owned by this entity type.
    pub fn tenant_roles(&self) -> Vec<TenantRole> {
        match self {
            Self::User => vec![TenantRole::Holder],
            Self::Organization => vec![TenantRole::Issuer, TenantRole::Verifier],
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "User"),
            Self::Organization => write!(f, "Organization"),
        }
    }
}
