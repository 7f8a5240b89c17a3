pub(crate) mod feedback;
pub(crate) mod filter;
pub(crate) mod property;
pub(crate) mod sale;

use std::{cmp::Ordering, marker::PhantomData, path::Path};

use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sled::{Batch, Db, Tree};

pub(crate) use self::filter::Filter;
use self::{feedback::Feedback, property::Property, sale::Sale};
use crate::schema::FieldType;
use crate::utils::{flatten, parse_date, Document};

/// A typed record kept in its own sled tree.
pub(crate) trait Record: Serialize + DeserializeOwned {
    const COLLECTION: &'static str;

    fn tree(db: &Database) -> &Tree;
}

/// The capability the query executor needs from a store: scan one
/// collection through an optional filter and hand back a cursor.
pub(crate) trait DataStore: Clone + Send + Sync + 'static {
    fn find(&self, collection: &str, filter: Option<Filter>) -> Result<Cursor>;
}

#[derive(Clone)]
pub(crate) struct Database {
    db: Db,
    sales: Tree,
    properties: Tree,
    feedback: Tree,
}

impl Database {
    pub(crate) fn connect(path: &Path) -> Result<Database> {
        let db = sled::open(path)
            .with_context(|| format!("cannot open database at {}", path.display()))?;
        let sales = db.open_tree(Sale::COLLECTION)?;
        let properties = db.open_tree(Property::COLLECTION)?;
        let feedback = db.open_tree(Feedback::COLLECTION)?;
        Ok(Database {
            db,
            sales,
            properties,
            feedback,
        })
    }

    pub(crate) fn insert<R: Record>(&self, record: &R) -> Result<()> {
        let key = self.db.generate_id()?.to_be_bytes();
        R::tree(self).insert(key, bincode::serialize(record)?)?;
        Ok(())
    }

    pub(crate) fn insert_many<R: Record>(&self, records: &[R]) -> Result<usize> {
        let mut batch = Batch::default();
        for record in records {
            let key = self.db.generate_id()?.to_be_bytes().to_vec();
            batch.insert(key, bincode::serialize(record)?);
        }
        R::tree(self).apply_batch(batch)?;
        Ok(records.len())
    }

    /// All records of one type, in insertion order.
    pub(crate) fn records<R: Record>(&self) -> Iter<R> {
        Iter::new(R::tree(self).iter())
    }

    pub(crate) fn count<R: Record>(&self) -> usize {
        R::tree(self).len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.sales.is_empty() && self.properties.is_empty() && self.feedback.is_empty()
    }

    pub(crate) fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn documents(&self, collection: &str) -> Result<DocumentIter> {
        fn boxed<R: Record + Send + 'static>(iter: Iter<R>) -> DocumentIter {
            Box::new(iter.map(|record| to_document(&record?)))
        }

        match collection {
            Sale::COLLECTION => Ok(boxed(self.records::<Sale>())),
            Property::COLLECTION => Ok(boxed(self.records::<Property>())),
            Feedback::COLLECTION => Ok(boxed(self.records::<Feedback>())),
            _ => bail!("collection {collection} is not stored"),
        }
    }
}

impl DataStore for Database {
    fn find(&self, collection: &str, filter: Option<Filter>) -> Result<Cursor> {
        let docs = self.documents(collection)?.filter(move |doc| match doc {
            Ok(doc) => filter.as_ref().is_none_or(|f| f.matches(doc)),
            Err(_) => true,
        });
        Ok(Cursor::new(docs))
    }
}

pub(crate) fn to_document<R: Serialize>(record: &R) -> Result<Document> {
    Ok(flatten(serde_json::to_value(record)?))
}

pub(crate) struct Iter<T> {
    inner: sled::Iter,
    phantom: PhantomData<T>,
}

impl<T> Iter<T> {
    fn new(inner: sled::Iter) -> Self {
        Self {
            inner,
            phantom: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Iter<T> {
    fn decode(item: sled::Result<(sled::IVec, sled::IVec)>) -> Result<T> {
        let (_, value) = item?;
        Ok(bincode::deserialize(&value)?)
    }
}

impl<T: DeserializeOwned> Iterator for Iter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(Self::decode)
    }
}

impl<T: DeserializeOwned> DoubleEndedIterator for Iter<T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(Self::decode)
    }
}

type DocumentIter = Box<dyn Iterator<Item = Result<Document>> + Send>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Projection {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    fn apply(&self, mut doc: Document) -> Document {
        let covers = |fields: &[String], key: &str| {
            fields.iter().any(|field| {
                key == field
                    || key
                        .strip_prefix(field.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
            })
        };
        match self {
            Projection::Include(fields) => doc.retain(|key, _| covers(fields, key)),
            Projection::Exclude(fields) => doc.retain(|key, _| !covers(fields, key)),
        }
        doc
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SortKey {
    pub(crate) field: String,
    pub(crate) direction: SortDirection,
    /// Date fields are ordered chronologically rather than as text.
    pub(crate) field_type: FieldType,
}

/// Lazily applies projection, sort and limit to a document scan. Nothing is
/// read until [`Cursor::collect`].
pub(crate) struct Cursor {
    docs: DocumentIter,
    projection: Option<Projection>,
    sort: Vec<SortKey>,
    limit: Option<usize>,
}

impl Cursor {
    pub(crate) fn new<I>(docs: I) -> Self
    where
        I: Iterator<Item = Result<Document>> + Send + 'static,
    {
        Self {
            docs: Box::new(docs),
            projection: None,
            sort: Vec::new(),
            limit: None,
        }
    }

    pub(crate) fn project(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    pub(crate) fn sort(mut self, keys: Vec<SortKey>) -> Self {
        self.sort = keys;
        self
    }

    pub(crate) fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn collect(self) -> Result<Vec<Document>> {
        let limit = self.limit.unwrap_or(usize::MAX);
        let docs = if self.sort.is_empty() {
            self.docs.take(limit).collect::<Result<Vec<_>>>()?
        } else {
            // Sorting sees every matching document; the projection is applied
            // afterwards so excluded fields can still order the rows.
            let mut docs = self.docs.collect::<Result<Vec<_>>>()?;
            docs.sort_by(|a, b| compare_documents(a, b, &self.sort));
            docs.truncate(limit);
            docs
        };

        Ok(match &self.projection {
            Some(projection) => docs.into_iter().map(|doc| projection.apply(doc)).collect(),
            None => docs,
        })
    }
}

fn compare_documents(a: &Document, b: &Document, keys: &[SortKey]) -> Ordering {
    keys.iter()
        .map(|key| {
            let (a, b) = (a.get(&key.field), b.get(&key.field));
            let ord = match key.field_type {
                FieldType::Date => compare_dates(a, b),
                _ => compare_values(a, b),
            };
            match key.direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        })
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Parsed dates compare by instant; anything that does not parse falls back
/// to [`compare_values`].
fn compare_dates(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let date = |value: Option<&Value>| value.and_then(Value::as_str).and_then(parse_date);
    match (date(a), date(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => compare_values(a, b),
    }
}

/// Orders values the way a document store does: missing and null first,
/// then numbers, strings, booleans, arrays and objects.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(Value::Bool(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::database::sale::test_sale;

    fn docs(values: Vec<Value>) -> Cursor {
        Cursor::new(values.into_iter().map(|v| Ok(flatten(v))))
    }

    #[test]
    fn insert_and_scan_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        assert!(db.is_empty());

        db.insert(&test_sale(1, "Woodlands", 500_000)).unwrap();
        db.insert_many(&[
            test_sale(2, "Tampines", 700_000),
            test_sale(3, "Jurong", 600_000),
        ])
        .unwrap();

        assert!(!db.is_empty());
        assert_eq!(db.count::<Sale>(), 3);
        assert_eq!(db.count::<Property>(), 0);

        let ids: Vec<_> = db
            .records::<Sale>()
            .map(|sale| sale.unwrap().property_id)
            .collect();
        assert_eq!(ids, ["PROP001", "PROP002", "PROP003"]);

        let last = db.records::<Sale>().next_back().unwrap().unwrap();
        assert_eq!(last.location.city, "Jurong");
    }

    #[test]
    fn find_flattens_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        db.insert_many(&[
            test_sale(1, "Woodlands", 500_000),
            test_sale(2, "Tampines", 700_000),
        ])
        .unwrap();

        let collection = crate::schema::init().collection("Sale").unwrap();
        let filter = Filter::compile(&json!({"location.city": "Tampines"}), collection).unwrap();
        let rows = db.find("Sale", Some(filter)).unwrap().collect().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["propertyId"], "PROP002");
        assert_eq!(rows[0]["price"], 700_000);
        assert!(rows[0].contains_key("customer.gender"));
    }

    #[test]
    fn find_rejects_unstored_collection() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        assert!(db.find("Users", None).is_err());
    }

    #[test]
    fn cursor_sorts_before_limit() {
        let rows = docs(vec![
            json!({"name": "b", "price": 2}),
            json!({"name": "a", "price": 3}),
            json!({"name": "c", "price": 1}),
        ])
        .sort(vec![SortKey {
            field: "price".to_string(),
            direction: SortDirection::Descending,
            field_type: FieldType::Number,
        }])
        .limit(2)
        .collect()
        .unwrap();
        let names: Vec<_> = rows.iter().map(|r| r["name"].clone()).collect();
        assert_eq!(names, [json!("a"), json!("b")]);
    }

    #[test]
    fn cursor_sort_is_stable_across_keys() {
        let rows = docs(vec![
            json!({"city": "x", "price": 2, "id": 1}),
            json!({"city": "y", "price": 1, "id": 2}),
            json!({"city": "x", "price": 1, "id": 3}),
            json!({"city": "x", "price": 1, "id": 4}),
        ])
        .sort(vec![
            SortKey {
                field: "city".to_string(),
                direction: SortDirection::Ascending,
                field_type: FieldType::String,
            },
            SortKey {
                field: "price".to_string(),
                direction: SortDirection::Ascending,
                field_type: FieldType::Number,
            },
        ])
        .collect()
        .unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, [json!(3), json!(4), json!(1), json!(2)]);
    }

    #[test]
    fn missing_values_sort_first() {
        let rows = docs(vec![
            json!({"id": 1, "nps": 5}),
            json!({"id": 2}),
            json!({"id": 3, "nps": "n/a"}),
        ])
        .sort(vec![SortKey {
            field: "nps".to_string(),
            direction: SortDirection::Ascending,
            field_type: FieldType::Number,
        }])
        .collect()
        .unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, [json!(2), json!(1), json!(3)]);
    }

    #[test]
    fn projection_keeps_prefixed_fields() {
        let rows = docs(vec![json!({
            "propertyId": "PROP001",
            "location": {"city": "Woodlands", "district": "District 1"},
            "price": 1
        })])
        .project(Projection::Include(vec!["location".to_string()]))
        .collect()
        .unwrap();
        let keys: Vec<_> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["location.city", "location.district"]);

        let rows = docs(vec![json!({"a": 1, "b": 2, "c": 3})])
            .project(Projection::Exclude(vec!["b".to_string()]))
            .collect()
            .unwrap();
        let keys: Vec<_> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["a", "c"]);
    }

    #[test]
    fn projection_does_not_hide_sort_field() {
        let rows = docs(vec![
            json!({"name": "b", "price": 2}),
            json!({"name": "a", "price": 1}),
        ])
        .project(Projection::Include(vec!["name".to_string()]))
        .sort(vec![SortKey {
            field: "price".to_string(),
            direction: SortDirection::Ascending,
            field_type: FieldType::Number,
        }])
        .collect()
        .unwrap();
        assert_eq!(rows[0]["name"], "a");
        assert!(!rows[0].contains_key("price"));
    }

    #[test]
    fn limit_without_sort_stops_reading() {
        let cursor = Cursor::new((0..).map(|i| Ok(flatten(json!({ "i": i })))));
        let rows = cursor.limit(3).collect().unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn date_sort_is_chronological() {
        let rows = docs(vec![
            json!({"id": 1, "dateOfSale": "2024-05-01T10:00:00Z"}),
            json!({"id": 2, "dateOfSale": "2024-05-01T10:00:00.500Z"}),
            json!({"id": 3, "dateOfSale": "2024-05-01T09:59:59.900+00:00"}),
            json!({"id": 4, "dateOfSale": "2024-05-01T17:30:00+08:00"}),
        ])
        .sort(vec![SortKey {
            field: "dateOfSale".to_string(),
            direction: SortDirection::Ascending,
            field_type: FieldType::Date,
        }])
        .collect()
        .unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, [json!(4), json!(3), json!(1), json!(2)]);
    }
}
