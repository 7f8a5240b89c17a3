use anyhow::{ensure, Result};
use serde_json::{Map, Value};
use tracing::{debug, error};

use super::{QueryError, QuerySpec, ResultSet};
use crate::database::{
    filter::{Filter, FilterError},
    DataStore, Projection, SortDirection, SortKey,
};
use crate::schema::{Collection, SchemaRegistry};

/// Row caps applied to every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Limits {
    default: usize,
    max: usize,
}

impl Limits {
    pub(crate) fn new(default: usize, max: usize) -> Result<Self> {
        ensure!(default > 0, "default query limit must be positive");
        ensure!(
            default <= max,
            "default query limit {default} exceeds maximum {max}"
        );
        Ok(Self { default, max })
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            default: 100,
            max: 1000,
        }
    }
}

/// A validated query, ready to run.
#[derive(Debug)]
struct Plan {
    collection: String,
    filter: Option<Filter>,
    projection: Option<Projection>,
    sort: Vec<SortKey>,
    limit: usize,
}

impl Plan {
    fn run<S: DataStore>(self, store: &S) -> Result<ResultSet> {
        let mut cursor = store.find(&self.collection, self.filter)?;
        if let Some(projection) = self.projection {
            cursor = cursor.project(projection);
        }
        if !self.sort.is_empty() {
            cursor = cursor.sort(self.sort);
        }
        cursor.limit(self.limit).collect()
    }
}

pub(crate) struct QueryExecutor<S> {
    store: S,
    registry: &'static SchemaRegistry,
    limits: Limits,
}

impl<S: DataStore> QueryExecutor<S> {
    pub(crate) fn new(store: S, registry: &'static SchemaRegistry, limits: Limits) -> Self {
        Self {
            store,
            registry,
            limits,
        }
    }

    /// Validates `spec` and runs it. Nothing reaches the store unless every
    /// clause passes validation.
    pub(crate) async fn execute(&self, spec: &QuerySpec) -> Result<ResultSet, QueryError> {
        let plan = self.plan(spec)?;
        debug!("Executing {plan:?}");

        let store = self.store.clone();
        let rows = tokio::task::spawn_blocking(move || plan.run(&store))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|result| result)
            .map_err(|e| {
                error!("Query on {} failed: {e:#}", spec.collection);
                QueryError::Execution(e)
            })?;
        Ok(rows)
    }

    fn plan(&self, spec: &QuerySpec) -> Result<Plan, QueryError> {
        let collection = self
            .registry
            .collection(&spec.collection)
            .ok_or_else(|| QueryError::UnknownCollection(spec.collection.clone()))?;

        Ok(Plan {
            collection: collection.name().to_string(),
            filter: compile_filter(spec.filter.as_ref(), collection)?,
            projection: parse_projection(spec.projection.as_ref(), collection)?,
            sort: parse_sort(spec.sort.as_ref(), collection)?,
            limit: self.limit(spec.limit)?,
        })
    }

    fn limit(&self, requested: Option<i64>) -> Result<usize, QueryError> {
        match requested {
            None | Some(0) => Ok(self.limits.default),
            Some(n) if n < 0 => Err(QueryError::InvalidLimit(n)),
            Some(n) => Ok(usize::try_from(n).map_or(self.limits.max, |n| n.min(self.limits.max))),
        }
    }
}

fn invalid_field(collection: &Collection, field: &str) -> QueryError {
    QueryError::InvalidField {
        collection: collection.name().to_string(),
        field: field.to_string(),
    }
}

fn compile_filter(
    filter: Option<&Value>,
    collection: &Collection,
) -> Result<Option<Filter>, QueryError> {
    match filter {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) if map.is_empty() => Ok(None),
        Some(filter) => Filter::compile(filter, collection)
            .map(Some)
            .map_err(|e| match e {
                FilterError::UnknownField(field) => invalid_field(collection, &field),
                other => QueryError::InvalidFilter(other.to_string()),
            }),
    }
}

/// Accepts `{"price": 1, "location": 1}`, `{"feedback": 0}`,
/// `["price", "location.city"]` or `"price -feedback"`.
fn parse_projection(
    projection: Option<&Value>,
    collection: &Collection,
) -> Result<Option<Projection>, QueryError> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();

    match projection {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(map)) => {
            for (field, flag) in map {
                // Records carry no `_id`; models often add it out of habit.
                if field == "_id" {
                    continue;
                }
                match flag {
                    Value::Bool(true) => include.push(field.clone()),
                    Value::Bool(false) => exclude.push(field.clone()),
                    Value::Number(n) if n.as_f64() == Some(1.0) => include.push(field.clone()),
                    Value::Number(n) if n.as_f64() == Some(0.0) => exclude.push(field.clone()),
                    other => {
                        return Err(QueryError::InvalidProjection(format!(
                            "`{field}` must be 1 or 0, got {other}"
                        )))
                    }
                }
            }
        }
        Some(Value::Array(fields)) => {
            for field in fields {
                let Value::String(field) = field else {
                    return Err(QueryError::InvalidProjection(
                        "field list must contain names".to_string(),
                    ));
                };
                include.push(field.clone());
            }
        }
        Some(Value::String(fields)) => {
            for field in fields.split_whitespace() {
                match field.strip_prefix('-') {
                    Some(field) => exclude.push(field.to_string()),
                    None => include.push(field.to_string()),
                }
            }
        }
        Some(other) => {
            return Err(QueryError::InvalidProjection(format!(
                "unsupported projection {other}"
            )))
        }
    }

    if let Some(field) = include
        .iter()
        .chain(&exclude)
        .find(|field| !collection.has_path(field))
    {
        return Err(invalid_field(collection, field));
    }

    match (include.is_empty(), exclude.is_empty()) {
        (true, true) => Ok(None),
        (false, true) => Ok(Some(Projection::Include(include))),
        (true, false) => Ok(Some(Projection::Exclude(exclude))),
        (false, false) => Err(QueryError::InvalidProjection(
            "cannot mix included and excluded fields".to_string(),
        )),
    }
}

/// Accepts `{"price": -1, "dateOfSale": "asc"}` or `"-price dateOfSale"`.
fn parse_sort(sort: Option<&Value>, collection: &Collection) -> Result<Vec<SortKey>, QueryError> {
    let keys = match sort {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(map)) => sort_object(map)?,
        Some(Value::String(fields)) => fields
            .split_whitespace()
            .map(|field| match field.strip_prefix('-') {
                Some(field) => (field.to_string(), SortDirection::Descending),
                None => (field.to_string(), SortDirection::Ascending),
            })
            .collect(),
        Some(other) => {
            return Err(QueryError::InvalidSort(format!("unsupported sort {other}")))
        }
    };

    keys.into_iter()
        .map(|(field, direction)| {
            let field_type = collection
                .field(&field)
                .ok_or_else(|| invalid_field(collection, &field))?;
            Ok(SortKey {
                field,
                direction,
                field_type,
            })
        })
        .collect()
}

fn sort_object(map: &Map<String, Value>) -> Result<Vec<(String, SortDirection)>, QueryError> {
    map.iter()
        .map(|(field, direction)| {
            let direction = match direction {
                Value::Number(n) if n.as_f64() == Some(1.0) => SortDirection::Ascending,
                Value::Number(n) if n.as_f64() == Some(-1.0) => SortDirection::Descending,
                Value::String(s) => match s.to_ascii_lowercase().as_str() {
                    "asc" | "ascending" => SortDirection::Ascending,
                    "desc" | "descending" => SortDirection::Descending,
                    _ => {
                        return Err(QueryError::InvalidSort(format!(
                            "`{field}` has unknown direction `{s}`"
                        )))
                    }
                },
                other => {
                    return Err(QueryError::InvalidSort(format!(
                        "`{field}` must be 1 or -1, got {other}"
                    )))
                }
            };
            Ok((field.clone(), direction))
        })
        .collect()
}
