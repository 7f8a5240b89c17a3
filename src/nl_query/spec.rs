use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::Document;

/// A data request produced by the translator.
///
/// Nothing here is trusted: the executor checks the collection and every
/// field against the schema registry before the store is touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub(crate) struct QuerySpec {
    /// Name of the collection to read, e.g. `Sale`.
    pub(crate) collection: String,
    /// Match conditions keyed by dotted field path, using `$eq`, `$ne`,
    /// `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$regex`, `$options`,
    /// `$exists`, `$and`, `$or` and `$nor`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) filter: Option<Value>,
    /// Fields to return (`{"price": 1}`) or to leave out (`{"feedback": 0}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) projection: Option<Value>,
    /// Sort keys in priority order, `1` for ascending and `-1` for descending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) sort: Option<Value>,
    /// Maximum number of records to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) limit: Option<i64>,
}

/// Materialized rows, each flattened to dotted field names.
pub(crate) type ResultSet = Vec<Document>;
