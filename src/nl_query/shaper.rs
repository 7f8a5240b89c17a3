use async_graphql::{Enum, SimpleObject};
use serde::Serialize;
use serde_json::Value;

use crate::utils::{parse_date, Document};

#[derive(Enum, Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum PresentationMode {
    NoData,
    Tabular,
    TimeSeriesChart,
    CategoricalChart,
}

/// How a result set should be displayed.
#[derive(SimpleObject, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Presentation {
    pub(crate) mode: PresentationMode,
    /// Column order of the table view.
    pub(crate) columns: Vec<String>,
    /// The x-axis or grouping field of a chart.
    pub(crate) category_field: Option<String>,
    /// One line or bar series per field.
    pub(crate) value_fields: Vec<String>,
}

/// Picks a presentation for `rows`.
///
/// The category is the first field holding text (or dates) in every row and
/// the value fields are all other fields that are numeric in every row.
/// Without both, rows are shown as a table. A category made entirely of
/// dates gives a time series; anything else gives grouped bars.
pub(crate) fn shape(rows: &[Document]) -> Presentation {
    let Some(first) = rows.first() else {
        return Presentation {
            mode: PresentationMode::NoData,
            columns: Vec::new(),
            category_field: None,
            value_fields: Vec::new(),
        };
    };

    let columns: Vec<String> = first.keys().cloned().collect();
    let category_field = columns
        .iter()
        .find(|column| all(rows, column, is_category_value))
        .cloned();
    let value_fields: Vec<String> = columns
        .iter()
        .filter(|column| Some(*column) != category_field.as_ref())
        .filter(|column| all(rows, column, Value::is_number))
        .cloned()
        .collect();

    let mode = match &category_field {
        Some(_) if value_fields.is_empty() => PresentationMode::Tabular,
        Some(category) if all(rows, category, is_date_value) => PresentationMode::TimeSeriesChart,
        Some(_) => PresentationMode::CategoricalChart,
        None => PresentationMode::Tabular,
    };

    Presentation {
        mode,
        columns,
        category_field,
        value_fields,
    }
}

fn all(rows: &[Document], column: &str, test: impl Fn(&Value) -> bool) -> bool {
    rows.iter().all(|row| row.get(column).is_some_and(&test))
}

fn is_category_value(value: &Value) -> bool {
    match value {
        Value::String(s) => s.trim().parse::<f64>().is_err() || parse_date(s).is_some(),
        _ => false,
    }
}

fn is_date_value(value: &Value) -> bool {
    value.as_str().is_some_and(|s| parse_date(s).is_some())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::utils::flatten;

    fn rows(values: Vec<Value>) -> Vec<Document> {
        values.into_iter().map(flatten).collect()
    }

    #[test]
    fn empty_result_is_no_data() {
        let presentation = shape(&[]);
        assert_eq!(presentation.mode, PresentationMode::NoData);
        assert!(presentation.columns.is_empty());
    }

    #[test]
    fn date_category_gives_time_series() {
        let data = rows(vec![
            json!({"month": "2024-01", "sales": 4, "value": 3_200_000}),
            json!({"month": "2024-02", "sales": 6, "value": 5_100_000}),
        ]);
        let presentation = shape(&data);
        assert_eq!(presentation.mode, PresentationMode::TimeSeriesChart);
        assert_eq!(presentation.category_field.as_deref(), Some("month"));
        assert_eq!(presentation.value_fields, ["sales", "value"]);
    }

    #[test]
    fn same_data_with_plain_labels_gives_bars() {
        let data = rows(vec![
            json!({"month": "January", "sales": 4, "value": 3_200_000}),
            json!({"month": "February", "sales": 6, "value": 5_100_000}),
        ]);
        assert_eq!(shape(&data).mode, PresentationMode::CategoricalChart);
    }

    #[test]
    fn one_date_among_labels_is_still_categorical() {
        let data = rows(vec![
            json!({"when": "2024-01-05", "n": 1}),
            json!({"when": "last week", "n": 2}),
        ]);
        assert_eq!(shape(&data).mode, PresentationMode::CategoricalChart);
    }

    #[test]
    fn first_text_field_is_the_category() {
        let data = rows(vec![json!({
            "price": 500_000,
            "location": {"city": "Woodlands", "district": "District 3"},
            "dateOfSale": "2024-03-01T00:00:00Z",
            "nps": 8
        })]);
        let presentation = shape(&data);
        assert_eq!(presentation.category_field.as_deref(), Some("location.city"));
        assert_eq!(presentation.value_fields, ["price", "nps"]);
        assert_eq!(presentation.mode, PresentationMode::CategoricalChart);
        assert_eq!(
            presentation.columns,
            ["price", "location.city", "location.district", "dateOfSale", "nps"]
        );
    }

    #[test]
    fn numeric_strings_are_not_categories() {
        let data = rows(vec![
            json!({"code": "1001", "label": "a", "n": 1}),
            json!({"code": "1002", "label": "b", "n": 2}),
        ]);
        assert_eq!(shape(&data).category_field.as_deref(), Some("label"));
    }

    #[test]
    fn without_numbers_or_labels_rows_are_tabular() {
        let text_only = rows(vec![json!({"text": "Great agent", "sentiment": "positive"})]);
        assert_eq!(shape(&text_only).mode, PresentationMode::Tabular);

        let numbers_only = rows(vec![json!({"bedrooms": 3, "price": 1_000_000})]);
        let presentation = shape(&numbers_only);
        assert_eq!(presentation.mode, PresentationMode::Tabular);
        assert_eq!(presentation.category_field, None);
    }

    #[test]
    fn fields_missing_from_some_rows_do_not_qualify() {
        let data = rows(vec![
            json!({"city": "Jurong", "price": 1}),
            json!({"city": "Tampines", "price": null}),
        ]);
        let presentation = shape(&data);
        assert!(presentation.value_fields.is_empty());
        assert_eq!(presentation.mode, PresentationMode::Tabular);
    }
}
