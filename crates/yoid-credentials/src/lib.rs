//! YoID Credentials: Entity catalog, attribute resolution, schema registry,
//! and credential views.

pub mod accessor;
pub mod catalog;
pub mod error;
pub mod resolver;
pub mod schema;
pub mod view;

pub use accessor::{AccessorRegistry, FieldShape, PropertyPath, SourceRecord};
pub use catalog::{EntityCatalog, EntityDeclaration, SchemaEntityProperty};
pub use error::CredentialError;
pub use resolver::{AttributeResolver, NOT_AVAILABLE};
pub use schema::{SchemaDefinition, SchemaEntity, SchemaRegistry, SchemaRequest};
pub use view::{format_value, parse_credential, AttributeView, CredentialView, ViewDetail};
