//! Schema registry.
//!
//! Provider schemas carry only a name and a flat attribute list. The registry
//! cross-references that list against the entity catalog to recover which
//! domain record each attribute comes from and how to render it.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use yoid_core::{ArtifactType, SchemaType, SourceTag, SystemRole};
use yoid_provider::{ProviderSchema, SchemaUpsertRequest, SsiProvider};

use crate::catalog::{EntityCatalog, EntityDeclaration, SchemaEntityProperty};
use crate::error::CredentialError;

/// The catalog entity's properties that a given schema uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaEntity {
    pub id: Uuid,
    pub name: String,
    pub source: SourceTag,
    pub schema_types: Vec<SchemaType>,
    pub properties: Vec<SchemaEntityProperty>,
}

impl SchemaEntity {
    /// Bind a subset of a declaration's properties.
    pub fn from_declaration(
        declaration: &EntityDeclaration,
        properties: Vec<SchemaEntityProperty>,
    ) -> Self {
        Self {
            id: declaration.id,
            name: declaration.name.clone(),
            source: declaration.source,
            schema_types: declaration.schema_types.clone(),
            properties,
        }
    }
}

/// A provider schema resolved against the entity catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Provider schema id.
    pub id: String,
    /// Display name (the part after the separator).
    pub name: String,
    /// `"{Type}|{DisplayName}"`.
    pub full_name: String,
    pub schema_type: SchemaType,
    pub artifact_type: ArtifactType,
    pub version: String,
    pub entities: Vec<SchemaEntity>,
}

impl SchemaDefinition {
    /// All properties across entities.
    pub fn properties(&self) -> impl Iterator<Item = &SchemaEntityProperty> {
        self.entities.iter().flat_map(|e| e.properties.iter())
    }

    pub fn attribute_count(&self) -> usize {
        self.entities.iter().map(|e| e.properties.len()).sum()
    }

    /// Property declaring an attribute (case-insensitive).
    pub fn property(&self, attribute_name: &str) -> Option<&SchemaEntityProperty> {
        self.properties().find(|p| p.matches(attribute_name))
    }

    /// The property holding a system role.
    pub fn system_property(&self, role: SystemRole) -> Option<&SchemaEntityProperty> {
        self.properties().find(|p| p.system_role == Some(role))
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.properties().map(|p| p.attribute_name.clone()).collect()
    }
}

/// Create or update request for a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRequest {
    pub schema_type: SchemaType,
    #[serde(default)]
    pub artifact_type: ArtifactType,
    /// Display name; the full name is derived from it and the type.
    pub name: String,
    pub attributes: Vec<String>,
}

impl SchemaRequest {
    pub fn full_name(&self) -> String {
        self.schema_type.full_name(&self.name)
    }
}

/// Resolves, creates and updates provider schemas.
#[derive(Clone)]
pub struct SchemaRegistry {
    provider: Arc<dyn SsiProvider>,
    catalog: Arc<EntityCatalog>,
}

impl SchemaRegistry {
    pub fn new(provider: Arc<dyn SsiProvider>, catalog: Arc<EntityCatalog>) -> Self {
        Self { provider, catalog }
    }

    pub fn catalog(&self) -> &Arc<EntityCatalog> {
        &self.catalog
    }

    /// Fetch a schema by full name; missing is an error.
    pub async fn get_by_name(&self, full_name: &str) -> Result<SchemaDefinition, CredentialError> {
        self.get_by_name_or_none(full_name)
            .await?
            .ok_or_else(|| CredentialError::SchemaNotFound(full_name.to_string()))
    }

    /// Fetch a schema by full name.
    pub async fn get_by_name_or_none(
        &self,
        full_name: &str,
    ) -> Result<Option<SchemaDefinition>, CredentialError> {
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(CredentialError::InvalidArgument(
                "schema name is required".into(),
            ));
        }
        match self.provider.get_schema_by_name(full_name).await? {
            Some(raw) => Ok(Some(self.parse(&raw)?)),
            None => Ok(None),
        }
    }

    /// List schemas, optionally of one type.
    ///
    /// Provider schemas that do not follow the `Type|Name` convention are
    /// not ours and are skipped.
    pub async fn list(
        &self,
        schema_type: Option<SchemaType>,
    ) -> Result<Vec<SchemaDefinition>, CredentialError> {
        let mut result = Vec::new();
        for raw in self.provider.list_schemas().await? {
            let parsed_type = match SchemaType::parse_full_name(&raw.name) {
                Ok((t, _)) => t,
                Err(_) => {
                    tracing::debug!(schema = %raw.name, "skipping foreign schema");
                    continue;
                }
            };
            if schema_type.is_some_and(|t| t != parsed_type) {
                continue;
            }
            result.push(self.parse(&raw)?);
        }
        Ok(result)
    }

    /// Register a new schema.
    pub async fn create(&self, request: SchemaRequest) -> Result<SchemaDefinition, CredentialError> {
        let full_name = Self::validate_name(&request)?;

        if self.get_by_name_or_none(&full_name).await?.is_some() {
            return Err(CredentialError::AlreadyExists(full_name));
        }
        if !request.schema_type.supports_multiple()
            && !self.list(Some(request.schema_type)).await?.is_empty()
        {
            return Err(CredentialError::InvalidArgument(format!(
                "only one {} schema may exist",
                request.schema_type
            )));
        }

        let attributes = self.validate_attributes(request.schema_type, &request.attributes)?;
        let raw = self
            .provider
            .upsert_schema(SchemaUpsertRequest {
                name: full_name.clone(),
                artifact_type: request.artifact_type,
                attributes,
            })
            .await?;
        let schema = self.parse(&raw)?;

        tracing::info!(
            schema = %schema.full_name,
            version = %schema.version,
            attributes = schema.attribute_count(),
            "schema created"
        );
        Ok(schema)
    }

    /// Publish a new version of an existing schema. Attributes may only be added.
    pub async fn update(&self, request: SchemaRequest) -> Result<SchemaDefinition, CredentialError> {
        let full_name = Self::validate_name(&request)?;
        let existing = self.get_by_name(&full_name).await?;

        if existing.artifact_type != request.artifact_type {
            return Err(CredentialError::InvalidArgument(format!(
                "artifact type of {} cannot change from {} to {}",
                full_name, existing.artifact_type, request.artifact_type
            )));
        }

        let attributes = self.validate_attributes(request.schema_type, &request.attributes)?;
        let requested: HashSet<String> = attributes.iter().map(|a| a.to_lowercase()).collect();
        if let Some(removed) = existing
            .properties()
            .find(|p| !requested.contains(&p.attribute_name.to_lowercase()))
        {
            return Err(CredentialError::InvalidArgument(format!(
                "attribute '{}' cannot be removed from {}",
                removed.attribute_name, full_name
            )));
        }

        let raw = self
            .provider
            .upsert_schema(SchemaUpsertRequest {
                name: existing.full_name.clone(),
                artifact_type: request.artifact_type,
                attributes,
            })
            .await?;
        let schema = self.parse(&raw)?;

        tracing::info!(
            schema = %schema.full_name,
            version = %schema.version,
            attributes = schema.attribute_count(),
            "schema updated"
        );
        Ok(schema)
    }

    fn validate_name(request: &SchemaRequest) -> Result<String, CredentialError> {
        let full_name = request.full_name();
        SchemaType::parse_full_name(&full_name)
            .map_err(|e| CredentialError::InvalidArgument(e.to_string()))?;
        Ok(full_name)
    }

    /// Canonical attribute list for a request: the type's system attributes
    /// first, then the requested ones, de-duplicated case-insensitively.
    fn validate_attributes(
        &self,
        schema_type: SchemaType,
        requested: &[String],
    ) -> Result<Vec<String>, CredentialError> {
        let mut seen = HashSet::new();
        let mut attributes = Vec::new();

        for property in self.catalog.system_attributes(schema_type) {
            if seen.insert(property.attribute_name.to_lowercase()) {
                attributes.push(property.attribute_name.clone());
            }
        }

        for name in requested {
            let name = name.trim();
            if name.is_empty() {
                return Err(CredentialError::InvalidArgument(
                    "attribute names cannot be empty".into(),
                ));
            }
            let (entity, property) = self.catalog.lookup_attribute(name).ok_or_else(|| {
                CredentialError::InvalidArgument(format!("unknown attribute '{}'", name))
            })?;
            if !entity.supports(schema_type) {
                return Err(CredentialError::InvalidArgument(format!(
                    "attribute '{}' of entity '{}' cannot be used in {} schemas",
                    property.attribute_name, entity.name, schema_type
                )));
            }
            if seen.insert(property.attribute_name.to_lowercase()) {
                attributes.push(property.attribute_name.clone());
            }
        }

        Ok(attributes)
    }

    /// Resolve a provider schema against the catalog.
    pub fn parse(&self, raw: &ProviderSchema) -> Result<SchemaDefinition, CredentialError> {
        let (schema_type, display_name) = SchemaType::parse_full_name(&raw.name)?;

        let reported: HashSet<String> = raw
            .attribute_names
            .iter()
            .map(|a| a.trim().to_lowercase())
            .collect();

        let mut entities = Vec::new();
        for declaration in self.catalog.entities() {
            let matched: Vec<SchemaEntityProperty> = declaration
                .properties
                .iter()
                .filter(|p| reported.contains(&p.attribute_name.to_lowercase()))
                .cloned()
                .collect();
            if matched.is_empty() {
                continue;
            }
            if !declaration.supports(schema_type) {
                tracing::error!(
                    schema = %raw.name,
                    entity = %declaration.name,
                    "schema uses attributes of an entity outside its type"
                );
                return Err(CredentialError::DataInconsistency(format!(
                    "schema '{}' contains attributes of entity '{}', which is not a {} entity",
                    raw.name, declaration.name, schema_type
                )));
            }
            entities.push(SchemaEntity::from_declaration(declaration, matched));
        }

        let schema = SchemaDefinition {
            id: raw.id.clone(),
            name: display_name.to_string(),
            full_name: raw.name.clone(),
            schema_type,
            artifact_type: raw.artifact_type,
            version: raw.version.clone(),
            entities,
        };

        if schema.attribute_count() != raw.attribute_names.len() {
            tracing::error!(
                schema = %raw.name,
                reported = raw.attribute_names.len(),
                matched = schema.attribute_count(),
                "schema attributes out of sync with entity catalog"
            );
            return Err(CredentialError::DataInconsistency(format!(
                "schema '{}' reports {} attributes but {} match the entity catalog",
                raw.name,
                raw.attribute_names.len(),
                schema.attribute_count()
            )));
        }

        Ok(schema)
    }
}
