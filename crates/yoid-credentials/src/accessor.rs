//! Typed field extraction for schema entity properties.
//!
//! Property paths declared in the entity catalog are bound to extraction
//! functions here. The table is fixed at compile time; a path that is not in
//! it is a configuration error caught when the catalog loads.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use yoid_core::{ActivityCompletion, Lookup, Opportunity, SourceTag, User};

use crate::error::CredentialError;

/// Borrowed domain record handed to the resolver.
#[derive(Debug, Clone, Copy)]
pub enum SourceRecord<'a> {
    User(&'a User),
    Opportunity(&'a Opportunity),
    ActivityCompletion(&'a ActivityCompletion),
}

impl SourceRecord<'_> {
    /// Tag of the wrapped record.
    pub fn tag(&self) -> SourceTag {
        match self {
            Self::User(_) => SourceTag::User,
            Self::Opportunity(_) => SourceTag::Opportunity,
            Self::ActivityCompletion(_) => SourceTag::ActivityCompletion,
        }
    }
}

/// A 1- or 2-segment property path (`Title`, `Skills.Name`).
///
/// The second segment projects a field off every element of a list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PropertyPath {
    field: String,
    item: Option<String>,
}

impl PropertyPath {
    /// Parse a dotted path.
    pub fn parse(path: &str) -> Result<Self, CredentialError> {
        let segments: Vec<&str> = path.split('.').map(str::trim).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(CredentialError::Configuration(format!(
                "malformed property path '{}'",
                path
            )));
        }
        match segments.as_slice() {
            [field] => Ok(Self {
                field: field.to_string(),
                item: None,
            }),
            [field, item] => Ok(Self {
                field: field.to_string(),
                item: Some(item.to_string()),
            }),
            _ => Err(CredentialError::Configuration(format!(
                "property path '{}' has more than two segments",
                path
            ))),
        }
    }

    /// First segment: the field read off the source record.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Second segment: the field projected off each list element.
    pub fn item(&self) -> Option<&str> {
        self.item.as_deref()
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.item {
            Some(ref item) => write!(f, "{}.{}", self.field, item),
            None => write!(f, "{}", self.field),
        }
    }
}

impl TryFrom<String> for PropertyPath {
    type Error = CredentialError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PropertyPath> for String {
    fn from(path: PropertyPath) -> Self {
        path.to_string()
    }
}

/// Shape of a field on a source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    Scalar,
    List,
}

/// Extraction function for one field of `T`.
pub enum Accessor<T> {
    /// Stringified scalar value; `None` when absent.
    Scalar(fn(&T) -> Option<String>),
    /// List of reference entries.
    List(fn(&T) -> &[Lookup]),
}

impl<T> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Accessor<T> {}

impl<T> Accessor<T> {
    fn shape(&self) -> FieldShape {
        match self {
            Self::Scalar(_) => FieldShape::Scalar,
            Self::List(_) => FieldShape::List,
        }
    }
}

/// Value read off a source record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Scalar(Option<String>),
    List(&'a [Lookup]),
}

fn timestamp(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|v| v.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn user_skills(user: &User) -> &[Lookup] {
    &user.skills
}

fn opportunity_skills(opportunity: &Opportunity) -> &[Lookup] {
    &opportunity.skills
}

fn opportunity_countries(opportunity: &Opportunity) -> &[Lookup] {
    &opportunity.countries
}

fn opportunity_languages(opportunity: &Opportunity) -> &[Lookup] {
    &opportunity.languages
}

fn user_accessors() -> Vec<(&'static str, Accessor<User>)> {
    vec![
        ("Id", Accessor::Scalar(|u: &User| Some(u.id.to_string()))),
        ("Email", Accessor::Scalar(|u: &User| Some(u.email.clone()))),
        ("FirstName", Accessor::Scalar(|u: &User| u.first_name.clone())),
        ("Surname", Accessor::Scalar(|u: &User| u.surname.clone())),
        ("DisplayName", Accessor::Scalar(|u: &User| u.display_name.clone())),
        ("FullName", Accessor::Scalar(|u: &User| Some(u.tenant_display_name()))),
        ("PhoneNumber", Accessor::Scalar(|u: &User| u.phone_number.clone())),
        ("Country", Accessor::Scalar(|u: &User| u.country.clone())),
        (
            "DateOfBirth",
            Accessor::Scalar(|u: &User| u.date_of_birth.map(|d| d.to_string())),
        ),
        ("PhotoURL", Accessor::Scalar(|u: &User| u.photo_url.clone())),
        (
            "DateYoIDOnboarded",
            Accessor::Scalar(|u: &User| timestamp(u.date_yoid_onboarded)),
        ),
        ("YoIDIssuerName", Accessor::Scalar(|u: &User| u.yoid_issuer_name.clone())),
        (
            "YoIDIssuerLogoURL",
            Accessor::Scalar(|u: &User| u.yoid_issuer_logo_url.clone()),
        ),
        ("Skills", Accessor::List(user_skills)),
    ]
}

fn opportunity_accessors() -> Vec<(&'static str, Accessor<Opportunity>)> {
    vec![
        ("Id", Accessor::Scalar(|o: &Opportunity| Some(o.id.to_string()))),
        ("Title", Accessor::Scalar(|o: &Opportunity| Some(o.title.clone()))),
        ("Summary", Accessor::Scalar(|o: &Opportunity| o.summary.clone())),
        ("Type", Accessor::Scalar(|o: &Opportunity| o.type_name.clone())),
        (
            "OrganizationId",
            Accessor::Scalar(|o: &Opportunity| Some(o.organization_id.to_string())),
        ),
        (
            "OrganizationName",
            Accessor::Scalar(|o: &Opportunity| Some(o.organization_name.clone())),
        ),
        (
            "OrganizationLogoURL",
            Accessor::Scalar(|o: &Opportunity| o.organization_logo_url.clone()),
        ),
        (
            "ZltoReward",
            Accessor::Scalar(|o: &Opportunity| o.zlto_reward.map(|r| r.to_string())),
        ),
        ("DateStart", Accessor::Scalar(|o: &Opportunity| timestamp(o.date_start))),
        ("DateEnd", Accessor::Scalar(|o: &Opportunity| timestamp(o.date_end))),
        ("Skills", Accessor::List(opportunity_skills)),
        ("Countries", Accessor::List(opportunity_countries)),
        ("Languages", Accessor::List(opportunity_languages)),
    ]
}

fn completion_accessors() -> Vec<(&'static str, Accessor<ActivityCompletion>)> {
    vec![
        (
            "Id",
            Accessor::Scalar(|c: &ActivityCompletion| Some(c.id.to_string())),
        ),
        (
            "DateStart",
            Accessor::Scalar(|c: &ActivityCompletion| timestamp(c.date_start)),
        ),
        (
            "DateEnd",
            Accessor::Scalar(|c: &ActivityCompletion| timestamp(c.date_end)),
        ),
        (
            "DateCompleted",
            Accessor::Scalar(|c: &ActivityCompletion| timestamp(c.date_completed)),
        ),
    ]
}

fn index<T>(accessors: Vec<(&'static str, Accessor<T>)>) -> HashMap<String, Accessor<T>> {
    accessors
        .into_iter()
        .map(|(name, accessor)| (name.to_lowercase(), accessor))
        .collect()
}

/// Table from (source tag, field name) to a typed extraction function.
///
/// Field names are matched case-insensitively.
pub struct AccessorRegistry {
    user: HashMap<String, Accessor<User>>,
    opportunity: HashMap<String, Accessor<Opportunity>>,
    completion: HashMap<String, Accessor<ActivityCompletion>>,
}

impl AccessorRegistry {
    /// The accessor table for the pipeline's read models.
    pub fn standard() -> Self {
        Self {
            user: index(user_accessors()),
            opportunity: index(opportunity_accessors()),
            completion: index(completion_accessors()),
        }
    }

    /// Shape of a field, or `None` if the source has no such field.
    pub fn shape(&self, tag: SourceTag, field: &str) -> Option<FieldShape> {
        let key = field.to_lowercase();
        match tag {
            SourceTag::User => self.user.get(&key).map(Accessor::shape),
            SourceTag::Opportunity => self.opportunity.get(&key).map(Accessor::shape),
            SourceTag::ActivityCompletion => self.completion.get(&key).map(Accessor::shape),
        }
    }

    /// Check that a path is readable from a source.
    pub fn validate(&self, tag: SourceTag, path: &PropertyPath) -> Result<(), CredentialError> {
        let shape = self.shape(tag, path.field()).ok_or_else(|| {
            CredentialError::Configuration(format!(
                "{} has no property '{}'",
                tag,
                path.field()
            ))
        })?;

        match (shape, path.item()) {
            (FieldShape::Scalar, None) => Ok(()),
            (FieldShape::List, Some(item)) => {
                if Self::is_item_field(item) {
                    Ok(())
                } else {
                    Err(CredentialError::Configuration(format!(
                        "list elements of {}.{} have no property '{}'",
                        tag,
                        path.field(),
                        item
                    )))
                }
            }
            (FieldShape::Scalar, Some(_)) => Err(CredentialError::Configuration(format!(
                "path '{}' projects off {}.{}, which is not a list",
                path,
                tag,
                path.field()
            ))),
            (FieldShape::List, None) => Err(CredentialError::Configuration(format!(
                "path '{}' reads list {}.{} without naming an element property",
                path,
                tag,
                path.field()
            ))),
        }
    }

    /// Read a field off a record; `None` if the source has no such field.
    pub fn read<'a>(&self, record: SourceRecord<'a>, field: &str) -> Option<FieldValue<'a>> {
        let key = field.to_lowercase();
        match record {
            SourceRecord::User(user) => self.user.get(&key).map(|a| Self::apply(*a, user)),
            SourceRecord::Opportunity(opportunity) => self
                .opportunity
                .get(&key)
                .map(|a| Self::apply(*a, opportunity)),
            SourceRecord::ActivityCompletion(completion) => self
                .completion
                .get(&key)
                .map(|a| Self::apply(*a, completion)),
        }
    }

    fn apply<T>(accessor: Accessor<T>, record: &T) -> FieldValue<'_> {
        match accessor {
            Accessor::Scalar(f) => FieldValue::Scalar(f(record)),
            Accessor::List(f) => FieldValue::List(f(record)),
        }
    }

    fn is_item_field(segment: &str) -> bool {
        segment.eq_ignore_ascii_case("Name") || segment.eq_ignore_ascii_case("Id")
    }

    /// Project a property off a list element; `None` if the element has no such property.
    pub fn project_item(item: &Lookup, segment: &str) -> Option<Option<String>> {
        if segment.eq_ignore_ascii_case("Name") {
            Some(item.name.clone())
        } else if segment.eq_ignore_ascii_case("Id") {
            Some(Some(item.id.to_string()))
        } else {
            None
        }
    }
}

impl fmt::Debug for AccessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorRegistry")
            .field("user", &self.user.len())
            .field("opportunity", &self.opportunity.len())
            .field("completion", &self.completion.len())
            .finish()
    }
}

impl Default for AccessorRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
