use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

/// A stored record flattened into dotted field paths, in natural field order.
pub(crate) type Document = Map<String, Value>;

/// Parses the date shapes that show up in stored records and translated
/// filters: RFC 3339 timestamps, naive `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD`
/// and `YYYY-MM`.
pub(crate) fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Flattens nested objects into dotted keys (`location.city`). Arrays and
/// scalars are kept as they are.
pub(crate) fn flatten(value: Value) -> Document {
    let mut out = Map::new();
    match value {
        Value::Object(map) => flatten_into(&mut out, None, map),
        other => {
            out.insert("value".to_string(), other);
        }
    }
    out
}

fn flatten_into(out: &mut Document, prefix: Option<&str>, map: Map<String, Value>) {
    for (key, value) in map {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key,
        };
        match value {
            Value::Object(inner) => flatten_into(out, Some(&path), inner),
            other => {
                out.insert(path, other);
            }
        }
    }
}
