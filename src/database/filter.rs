//! Document-store filter expressions.
//!
//! Filters arrive as JSON in the familiar operator style
//! (`{"price": {"$gte": 500000}, "location.city": "Woodlands"}`) and are
//! compiled against a collection's field table before they run. Compilation
//! rejects unknown fields, unsupported operators and operands of the wrong
//! shape, so a compiled [`Filter`] can be evaluated without further checks.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::{Collection, FieldType};
use crate::utils::{parse_date, Document};

const REGEX_SIZE_LIMIT: usize = 1 << 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum FilterError {
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("unsupported operator `{0}`")]
    UnsupportedOperator(String),
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl FilterError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        FilterError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
    Field {
        path: String,
        field_type: FieldType,
        conditions: Vec<Condition>,
    },
}

#[derive(Debug, Clone)]
pub(crate) enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Regex(Regex),
    Exists(bool),
}

impl Filter {
    pub(crate) fn compile(value: &Value, collection: &Collection) -> Result<Filter, FilterError> {
        let Value::Object(map) = value else {
            return Err(FilterError::invalid("filter", "expected an object"));
        };

        let mut clauses = Vec::with_capacity(map.len());
        for (key, value) in map {
            let clause = match key.as_str() {
                "$and" => Filter::And(compile_list(key, value, collection)?),
                "$or" => Filter::Or(compile_list(key, value, collection)?),
                "$nor" => Filter::Nor(compile_list(key, value, collection)?),
                op if op.starts_with('$') => {
                    return Err(FilterError::UnsupportedOperator(op.to_string()))
                }
                path => compile_field(path, value, collection)?,
            };
            clauses.push(clause);
        }

        if clauses.len() == 1 {
            Ok(clauses.remove(0))
        } else {
            Ok(Filter::And(clauses))
        }
    }

    pub(crate) fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(doc)),
            Filter::Nor(filters) => !filters.iter().any(|f| f.matches(doc)),
            Filter::Field {
                path,
                field_type,
                conditions,
            } => {
                let value = doc.get(path);
                conditions
                    .iter()
                    .all(|condition| condition.matches(*field_type, value))
            }
        }
    }
}

impl Condition {
    fn matches(&self, ty: FieldType, value: Option<&Value>) -> bool {
        match self {
            Condition::Eq(operand) => equals(ty, value, operand),
            Condition::Ne(operand) => !equals(ty, value, operand),
            Condition::Gt(operand) => any_ordered(ty, value, operand, Ordering::is_gt),
            Condition::Gte(operand) => any_ordered(ty, value, operand, Ordering::is_ge),
            Condition::Lt(operand) => any_ordered(ty, value, operand, Ordering::is_lt),
            Condition::Lte(operand) => any_ordered(ty, value, operand, Ordering::is_le),
            Condition::In(operands) => operands.iter().any(|o| equals(ty, value, o)),
            Condition::Nin(operands) => !operands.iter().any(|o| equals(ty, value, o)),
            Condition::Regex(re) => elements(value).any(|v| v.as_str().is_some_and(|s| re.is_match(s))),
            Condition::Exists(expected) => value.is_some() == *expected,
        }
    }
}

fn compile_list(
    op: &str,
    value: &Value,
    collection: &Collection,
) -> Result<Vec<Filter>, FilterError> {
    match value {
        Value::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| Filter::compile(item, collection))
            .collect(),
        _ => Err(FilterError::invalid(op, "expected a non-empty array of filters")),
    }
}

fn compile_field(path: &str, value: &Value, collection: &Collection) -> Result<Filter, FilterError> {
    let Some(field_type) = collection.field(path) else {
        return Err(FilterError::UnknownField(path.to_string()));
    };

    let conditions = match value {
        Value::Object(ops) if is_date_literal(ops) => {
            vec![Condition::Eq(operand(path, field_type, value)?)]
        }
        Value::Object(ops) if ops.keys().all(|k| k.starts_with('$')) && !ops.is_empty() => {
            compile_operators(path, field_type, ops)?
        }
        Value::Object(_) => {
            return Err(FilterError::invalid(
                path,
                "nested documents must be matched through dotted field paths",
            ))
        }
        _ => vec![Condition::Eq(operand(path, field_type, value)?)],
    };

    Ok(Filter::Field {
        path: path.to_string(),
        field_type,
        conditions,
    })
}

fn compile_operators(
    path: &str,
    ty: FieldType,
    ops: &Map<String, Value>,
) -> Result<Vec<Condition>, FilterError> {
    let options = match ops.get("$options") {
        Some(Value::String(options)) => Some(options.as_str()),
        Some(_) => return Err(FilterError::invalid(path, "$options must be a string")),
        None => None,
    };
    if options.is_some() && !ops.contains_key("$regex") {
        return Err(FilterError::invalid(path, "$options requires $regex"));
    }

    let mut conditions = Vec::with_capacity(ops.len());
    for (op, value) in ops {
        let condition = match op.as_str() {
            "$eq" => Condition::Eq(operand(path, ty, value)?),
            "$ne" => Condition::Ne(operand(path, ty, value)?),
            "$gt" => Condition::Gt(bound(path, ty, value)?),
            "$gte" => Condition::Gte(bound(path, ty, value)?),
            "$lt" => Condition::Lt(bound(path, ty, value)?),
            "$lte" => Condition::Lte(bound(path, ty, value)?),
            "$in" => Condition::In(operand_list(path, ty, value)?),
            "$nin" => Condition::Nin(operand_list(path, ty, value)?),
            "$regex" => Condition::Regex(regex(path, value, options)?),
            "$exists" => Condition::Exists(match value {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
                _ => return Err(FilterError::invalid(path, "$exists expects a boolean")),
            }),
            "$options" => continue,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        };
        conditions.push(condition);
    }
    Ok(conditions)
}

fn is_date_literal(map: &Map<String, Value>) -> bool {
    map.len() == 1 && map.contains_key("$date")
}

/// Normalizes a comparison operand: unwraps `{"$date": ...}` and checks
/// that date fields are compared against parseable dates.
fn operand(path: &str, ty: FieldType, value: &Value) -> Result<Value, FilterError> {
    let value = match value {
        Value::Object(map) if is_date_literal(map) => match &map["$date"] {
            Value::String(s) => Value::String(s.clone()),
            _ => return Err(FilterError::invalid(path, "$date expects a string")),
        },
        Value::Object(_) | Value::Array(_) => {
            return Err(FilterError::invalid(path, "expected a scalar value"))
        }
        other => other.clone(),
    };

    if ty == FieldType::Date {
        if let Value::String(s) = &value {
            if parse_date(s).is_none() {
                return Err(FilterError::invalid(path, format!("`{s}` is not a date")));
            }
        }
    }
    Ok(value)
}

/// Operand of a range operator. Numeric fields need a number.
fn bound(path: &str, ty: FieldType, value: &Value) -> Result<Value, FilterError> {
    let value = operand(path, ty, value)?;
    match (ty, &value) {
        (FieldType::Number, Value::Number(_)) => Ok(value),
        (FieldType::Number, _) => Err(FilterError::invalid(path, "expected a number")),
        (_, Value::Null) => Err(FilterError::invalid(path, "cannot order against null")),
        _ => Ok(value),
    }
}

fn operand_list(path: &str, ty: FieldType, value: &Value) -> Result<Vec<Value>, FilterError> {
    let Value::Array(items) = value else {
        return Err(FilterError::invalid(path, "expected an array"));
    };
    items.iter().map(|item| operand(path, ty, item)).collect()
}

fn regex(path: &str, value: &Value, options: Option<&str>) -> Result<Regex, FilterError> {
    let Value::String(pattern) = value else {
        return Err(FilterError::invalid(path, "$regex expects a string"));
    };

    let mut builder = RegexBuilder::new(pattern);
    builder.size_limit(REGEX_SIZE_LIMIT);
    for flag in options.unwrap_or_default().chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => {
                return Err(FilterError::invalid(
                    path,
                    format!("unsupported regex option `{other}`"),
                ))
            }
        };
    }
    builder
        .build()
        .map_err(|e| FilterError::invalid(path, e.to_string()))
}

/// The value itself, or its elements when it is a list.
fn elements(value: Option<&Value>) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Some(Value::Array(items)) => Box::new(items.iter()),
        Some(value) => Box::new(std::iter::once(value)),
        None => Box::new(std::iter::empty()),
    }
}

fn equals(ty: FieldType, value: Option<&Value>, operand: &Value) -> bool {
    if operand.is_null() {
        return matches!(value, None | Some(Value::Null));
    }
    elements(value).any(|v| compare(ty, v, operand) == Some(Ordering::Equal))
}

fn any_ordered(
    ty: FieldType,
    value: Option<&Value>,
    operand: &Value,
    accept: fn(Ordering) -> bool,
) -> bool {
    elements(value).any(|v| compare(ty, v, operand).is_some_and(accept))
}

/// Compares values of the same kind. Values of different kinds are
/// unordered and never match.
fn compare(ty: FieldType, value: &Value, operand: &Value) -> Option<Ordering> {
    match (value, operand) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) if ty == FieldType::Date => {
            Some(parse_date(a)?.cmp(&parse_date(b)?))
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}
