//! Internal entity-property metadata.
//!
//! The catalog declares which domain record fields can appear as credential
//! attributes, and under which schema types. Provider schemas are parsed
//! against it: every attribute a provider schema lists must be declared here.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use uuid::Uuid;

use yoid_core::{SchemaType, SourceTag, SystemRole, ValueKind};

use crate::accessor::{AccessorRegistry, PropertyPath};
use crate::error::CredentialError;
use crate::resolver::AttributeResolver;

const BUILTIN_CATALOG: &str = include_str!("builtin_catalog.toml");

/// Declaration of one credential attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaEntityProperty {
    /// Derived from the attribute name when not given.
    #[serde(default)]
    pub id: Uuid,
    /// Attribute name as registered at the provider.
    pub attribute_name: String,
    pub display_name: String,
    pub path: PropertyPath,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub system_role: Option<SystemRole>,
    /// Rendering pattern: a strftime format for dates, `0.00` style for numbers.
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub value_kind: ValueKind,
    #[serde(default)]
    pub description: Option<String>,
}

impl SchemaEntityProperty {
    /// Whether this is a display-critical (system) attribute.
    pub fn is_system(&self) -> bool {
        self.system_role.is_some()
    }

    /// Case-insensitive attribute name match.
    pub fn matches(&self, attribute_name: &str) -> bool {
        self.attribute_name.eq_ignore_ascii_case(attribute_name.trim())
    }
}

/// A group of properties read from a single source record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDeclaration {
    #[serde(default)]
    pub id: Uuid,
    pub name: String,
    pub source: SourceTag,
    /// Schema types this entity may contribute attributes to.
    pub schema_types: Vec<SchemaType>,
    #[serde(default)]
    pub properties: Vec<SchemaEntityProperty>,
}

impl EntityDeclaration {
    /// Whether the entity belongs to a schema type.
    pub fn supports(&self, schema_type: SchemaType) -> bool {
        self.schema_types.contains(&schema_type)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    entities: Vec<EntityDeclaration>,
}

/// Validated set of entity declarations bound to the accessor registry.
#[derive(Debug)]
pub struct EntityCatalog {
    entities: Vec<EntityDeclaration>,
    accessors: AccessorRegistry,
    /// Lowercased attribute name → (entity index, property index).
    attribute_index: HashMap<String, (usize, usize)>,
}

impl EntityCatalog {
    /// Validate declarations and build the catalog.
    pub fn new(mut entities: Vec<EntityDeclaration>) -> Result<Self, CredentialError> {
        let accessors = AccessorRegistry::standard();
        let mut attribute_index = HashMap::new();
        let mut entity_names = HashSet::new();
        let mut roles: HashSet<(SchemaType, SystemRole)> = HashSet::new();

        for (entity_idx, entity) in entities.iter_mut().enumerate() {
            if entity.name.trim().is_empty() {
                return Err(CredentialError::Configuration(
                    "entity declaration without a name".into(),
                ));
            }
            if !entity_names.insert(entity.name.to_lowercase()) {
                return Err(CredentialError::Configuration(format!(
                    "entity '{}' declared twice",
                    entity.name
                )));
            }
            if entity.schema_types.is_empty() {
                return Err(CredentialError::Configuration(format!(
                    "entity '{}' belongs to no schema type",
                    entity.name
                )));
            }
            if entity.id.is_nil() {
                entity.id = Uuid::new_v5(&Uuid::NAMESPACE_OID, entity.name.as_bytes());
            }

            for (property_idx, property) in entity.properties.iter_mut().enumerate() {
                let key = property.attribute_name.trim().to_lowercase();
                if key.is_empty() {
                    return Err(CredentialError::Configuration(format!(
                        "entity '{}' declares a property without an attribute name",
                        entity.name
                    )));
                }
                if attribute_index
                    .insert(key, (entity_idx, property_idx))
                    .is_some()
                {
                    return Err(CredentialError::Configuration(format!(
                        "attribute '{}' declared more than once",
                        property.attribute_name
                    )));
                }

                accessors.validate(entity.source, &property.path)?;

                if let Some(role) = property.system_role {
                    for schema_type in &entity.schema_types {
                        if !roles.insert((*schema_type, role)) {
                            return Err(CredentialError::Configuration(format!(
                                "schema type {} has more than one {} attribute",
                                schema_type, role
                            )));
                        }
                    }
                }

                if property.id.is_nil() {
                    property.id =
                        Uuid::new_v5(&Uuid::NAMESPACE_OID, property.attribute_name.as_bytes());
                }
            }
        }

        tracing::debug!(
            entities = entities.len(),
            attributes = attribute_index.len(),
            "entity catalog loaded"
        );

        Ok(Self {
            entities,
            accessors,
            attribute_index,
        })
    }

    /// The catalog shipped with the pipeline.
    pub fn builtin() -> Result<Self, CredentialError> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    /// Parse a TOML catalog (`[[entities]]` with nested `[[entities.properties]]`).
    pub fn from_toml_str(content: &str) -> Result<Self, CredentialError> {
        let file: CatalogFile = toml::from_str(content)
            .map_err(|e| CredentialError::Configuration(format!("invalid catalog: {}", e)))?;
        Self::new(file.entities)
    }

    /// Load a TOML catalog from disk.
    pub fn load(path: &Path) -> Result<Self, CredentialError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CredentialError::Configuration(format!(
                "cannot read catalog {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn entities(&self) -> &[EntityDeclaration] {
        &self.entities
    }

    /// Find the entity and property declaring an attribute (case-insensitive).
    pub fn lookup_attribute(
        &self,
        attribute_name: &str,
    ) -> Option<(&EntityDeclaration, &SchemaEntityProperty)> {
        let (entity_idx, property_idx) = self
            .attribute_index
            .get(&attribute_name.trim().to_lowercase())?;
        let entity = &self.entities[*entity_idx];
        Some((entity, &entity.properties[*property_idx]))
    }

    /// System-role attributes of every entity belonging to a schema type.
    pub fn system_attributes(&self, schema_type: SchemaType) -> Vec<&SchemaEntityProperty> {
        self.entities
            .iter()
            .filter(|e| e.supports(schema_type))
            .flat_map(|e| e.properties.iter().filter(|p| p.is_system()))
            .collect()
    }

    pub fn accessors(&self) -> &AccessorRegistry {
        &self.accessors
    }

    /// Resolver bound to this catalog's accessors.
    pub fn resolver(&self) -> AttributeResolver<'_> {
        AttributeResolver::new(&self.accessors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = EntityCatalog::builtin().unwrap();
        let names: Vec<&str> = catalog.entities().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Opportunity", "MyOpportunity", "User", "YoID"]);
        assert!(catalog.entities().iter().all(|e| !e.id.is_nil()));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = EntityCatalog::builtin().unwrap();
        let (entity, property) = catalog.lookup_attribute("opportunity_title").unwrap();
        assert_eq!(entity.name, "Opportunity");
        assert_eq!(property.system_role, Some(SystemRole::Title));
        assert!(catalog.lookup_attribute("Nope").is_none());
    }

    #[test]
    fn test_system_attributes_per_type() {
        let catalog = EntityCatalog::builtin().unwrap();
        let names = |t| {
            let mut v: Vec<String> = catalog
                .system_attributes(t)
                .into_iter()
                .map(|p| p.attribute_name.clone())
                .collect();
            v.sort();
            v
        };
        assert_eq!(
            names(SchemaType::YoId),
            vec!["YoID_Issuer", "YoID_IssuerLogoURL", "YoID_Title"]
        );
        assert_eq!(names(SchemaType::Opportunity).len(), 3);
    }

    #[test]
    fn test_property_ids_are_stable() {
        let a = EntityCatalog::builtin().unwrap();
        let b = EntityCatalog::builtin().unwrap();
        let (_, pa) = a.lookup_attribute("User_Email").unwrap();
        let (_, pb) = b.lookup_attribute("User_Email").unwrap();
        assert_eq!(pa.id, pb.id);
    }

    #[test]
    fn test_rejects_duplicate_attribute() {
        let toml = r#"
            [[entities]]
            name = "A"
            source = "User"
            schema_types = ["YoID"]
            [[entities.properties]]
            attribute_name = "Email"
            display_name = "Email"
            path = "Email"
            [[entities.properties]]
            attribute_name = "EMAIL"
            display_name = "Email again"
            path = "Email"
        "#;
        let err = EntityCatalog::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, CredentialError::Configuration(_)));
    }

    #[test]
    fn test_rejects_unbound_path() {
        let toml = r#"
            [[entities]]
            name = "A"
            source = "ActivityCompletion"
            schema_types = ["Opportunity"]
            [[entities.properties]]
            attribute_name = "A_Title"
            display_name = "Title"
            path = "Title"
        "#;
        assert!(EntityCatalog::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_rejects_malformed_path() {
        let toml = r#"
            [[entities]]
            name = "A"
            source = "Opportunity"
            schema_types = ["Opportunity"]
            [[entities.properties]]
            attribute_name = "A_Skills"
            display_name = "Skills"
            path = "Skills.Name.Id"
        "#;
        assert!(EntityCatalog::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_rejects_duplicate_system_role() {
        let toml = r#"
            [[entities]]
            name = "A"
            source = "User"
            schema_types = ["YoID"]
            [[entities.properties]]
            attribute_name = "A_Title"
            display_name = "Title"
            path = "FullName"
            system_role = "Title"
            [[entities.properties]]
            attribute_name = "A_Other"
            display_name = "Other"
            path = "Email"
            system_role = "Title"
        "#;
        assert!(EntityCatalog::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_rejects_entity_without_schema_types() {
        let toml = r#"
            [[entities]]
            name = "A"
            source = "User"
            schema_types = []
        "#;
        assert!(EntityCatalog::from_toml_str(toml).is_err());
    }
}
