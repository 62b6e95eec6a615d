use std::collections::BTreeMap;

use crate::accessor::{AccessorRegistry, FieldValue, SourceRecord};
use crate::catalog::SchemaEntityProperty;
use crate::error::CredentialError;
use crate::schema::SchemaEntity;

/// Value issued for an optional scalar attribute that has no value.
pub const NOT_AVAILABLE: &str = "n/a";

/// Separator between the projected values of a list attribute.
const LIST_SEPARATOR: &str = ", ";

/// Maps a schema entity's properties onto a source record.
///
/// Resolution is pure: the same entity and record always yield the same map.
#[derive(Debug, Clone, Copy)]
pub struct AttributeResolver<'a> {
    accessors: &'a AccessorRegistry,
}

impl<'a> AttributeResolver<'a> {
    pub fn new(accessors: &'a AccessorRegistry) -> Self {
        Self { accessors }
    }

    /// Resolve every property of `entity` against `record`.
    pub fn resolve(
        &self,
        entity: &SchemaEntity,
        record: SourceRecord<'_>,
    ) -> Result<BTreeMap<String, String>, CredentialError> {
        let mut attributes = BTreeMap::new();
        self.resolve_into(entity, record, &mut attributes)?;
        Ok(attributes)
    }

    /// Resolve `entity` against `record`, appending to `attributes`.
    pub fn resolve_into(
        &self,
        entity: &SchemaEntity,
        record: SourceRecord<'_>,
        attributes: &mut BTreeMap<String, String>,
    ) -> Result<(), CredentialError> {
        if entity.source != record.tag() {
            return Err(CredentialError::Configuration(format!(
                "entity '{}' reads from {}, got a {} record",
                entity.name,
                entity.source,
                record.tag()
            )));
        }

        for property in &entity.properties {
            let value = self.resolve_property(entity, property, record)?;
            attributes.insert(property.attribute_name.clone(), value);
        }
        Ok(())
    }

    fn resolve_property(
        &self,
        entity: &SchemaEntity,
        property: &SchemaEntityProperty,
        record: SourceRecord<'_>,
    ) -> Result<String, CredentialError> {
        let path = &property.path;
        let value = self.accessors.read(record, path.field()).ok_or_else(|| {
            CredentialError::Configuration(format!(
                "{} has no property '{}' (entity '{}', attribute '{}')",
                record.tag(),
                path.field(),
                entity.name,
                property.attribute_name
            ))
        })?;

        let resolved = match (value, path.item()) {
            (FieldValue::List(items), Some(item)) => {
                let mut parts = Vec::with_capacity(items.len());
                for element in items {
                    let projected = AccessorRegistry::project_item(element, item).ok_or_else(|| {
                        CredentialError::Configuration(format!(
                            "list elements of '{}' have no property '{}'",
                            path.field(),
                            item
                        ))
                    })?;
                    if let Some(v) = projected.filter(|v| !v.trim().is_empty()) {
                        parts.push(v);
                    }
                }
                if items.is_empty() && property.required {
                    return Err(Self::missing_required(entity, property));
                }
                parts.join(LIST_SEPARATOR)
            }
            (FieldValue::Scalar(v), None) => match v.filter(|v| !v.trim().is_empty()) {
                Some(v) => v,
                None if property.required => return Err(Self::missing_required(entity, property)),
                None => NOT_AVAILABLE.to_string(),
            },
            (FieldValue::Scalar(_), Some(_)) | (FieldValue::List(_), None) => {
                return Err(CredentialError::Configuration(format!(
                    "path '{}' does not match the shape of {}.{}",
                    path,
                    record.tag(),
                    path.field()
                )));
            }
        };

        if resolved.is_empty() && property.required {
            return Err(Self::missing_required(entity, property));
        }
        Ok(resolved)
    }

    fn missing_required(entity: &SchemaEntity, property: &SchemaEntityProperty) -> CredentialError {
        CredentialError::Configuration(format!(
            "required attribute '{}' of entity '{}' has no value",
            property.attribute_name, entity.name
        ))
    }
}
