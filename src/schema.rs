//! The catalog of collections the query subsystem is allowed to touch.
//!
//! The registry is built once at startup by [`init`] and shared read-only
//! for the lifetime of the process. Every translated query is checked
//! against it before the data store is consulted.

use std::sync::OnceLock;

use serde_json::{Map, Value};

use crate::database::{feedback::Feedback, property::Property, sale::Sale, Record};

static REGISTRY: OnceLock<SchemaRegistry> = OnceLock::new();

/// Builds the process-wide registry on first use and returns it. Calling
/// this again returns the same instance.
pub(crate) fn init() -> &'static SchemaRegistry {
    REGISTRY.get_or_init(SchemaRegistry::builtin)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldType {
    String,
    Number,
    Date,
    StringList,
}

impl FieldType {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::StringList => "string[]",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Collection {
    name: String,
    fields: Vec<(String, FieldType)>,
}

impl Collection {
    pub(crate) fn new<N: Into<String>>(
        name: N,
        fields: impl IntoIterator<Item = (N, FieldType)>,
    ) -> Self {
        Self {
            name: name.into(),
            fields: fields
                .into_iter()
                .map(|(field, ty)| (field.into(), ty))
                .collect(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Type of a leaf field, by its dotted path.
    pub(crate) fn field(&self, path: &str) -> Option<FieldType> {
        self.fields
            .iter()
            .find(|(name, _)| name == path)
            .map(|(_, ty)| *ty)
    }

    /// True for leaf fields and for object prefixes such as `location`.
    pub(crate) fn has_path(&self, path: &str) -> bool {
        self.fields.iter().any(|(name, _)| {
            name == path
                || name
                    .strip_prefix(path)
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    pub(crate) fn fields(&self) -> impl Iterator<Item = (&str, FieldType)> {
        self.fields.iter().map(|(name, ty)| (name.as_str(), *ty))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SchemaRegistry {
    collections: Vec<Collection>,
}

impl SchemaRegistry {
    pub(crate) fn new(collections: Vec<Collection>) -> Self {
        Self { collections }
    }

    fn builtin() -> Self {
        use FieldType as T;

        Self::new(vec![
            Collection::new(
                Sale::COLLECTION,
                [
                    ("propertyId", T::String),
                    ("propertyName", T::String),
                    ("location.city", T::String),
                    ("location.district", T::String),
                    ("price", T::Number),
                    ("dateOfSale", T::Date),
                    ("customer.gender", T::String),
                    ("customer.ageGroup", T::String),
                    ("salesAgent", T::String),
                    ("nps", T::Number),
                    ("feedback", T::String),
                ],
            ),
            Collection::new(
                Property::COLLECTION,
                [
                    ("propertyId", T::String),
                    ("propertyName", T::String),
                    ("propertyType", T::String),
                    ("location.city", T::String),
                    ("location.district", T::String),
                    ("location.address", T::String),
                    ("price", T::Number),
                    ("bedrooms", T::Number),
                    ("bathrooms", T::Number),
                    ("area", T::Number),
                    ("features", T::StringList),
                    ("status", T::String),
                    ("listedDate", T::Date),
                ],
            ),
            Collection::new(
                Feedback::COLLECTION,
                [
                    ("text", T::String),
                    ("sentiment", T::String),
                    ("source", T::String),
                    ("category", T::String),
                    ("createdAt", T::Date),
                ],
            ),
        ])
    }

    pub(crate) fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.iter().map(Collection::name)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// The schema feed forwarded to the translator:
    /// `{ "Sale": { "price": "number", ... }, ... }`.
    pub(crate) fn describe(&self) -> Value {
        let collections = self
            .collections
            .iter()
            .map(|collection| {
                let fields = collection
                    .fields()
                    .map(|(name, ty)| (name.to_string(), Value::from(ty.as_str())))
                    .collect::<Map<_, _>>();
                (collection.name.clone(), Value::Object(fields))
            })
            .collect::<Map<_, _>>();
        Value::Object(collections)
    }
}
