//! Natural-language data queries.
//!
//! Free text is translated into a [`QuerySpec`] by a language model, checked
//! against the schema registry, run against the store, and the rows are
//! classified for table or chart display.

pub(crate) mod compiler;
pub(crate) mod executor;
pub(crate) mod shaper;
pub(crate) mod spec;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

pub(crate) use self::compiler::{QueryCompiler, TranslationError, TranslationRequest, Translator};
pub(crate) use self::executor::{Limits, QueryExecutor};
pub(crate) use self::shaper::Presentation;
pub(crate) use self::spec::{QuerySpec, ResultSet};
use crate::database::{DataStore, Database};

#[derive(Debug, Error)]
pub(crate) enum QueryError {
    #[error("query text is empty")]
    EmptyQuery,
    #[error(transparent)]
    Translation(#[from] TranslationError),
    #[error("unknown collection `{0}`")]
    UnknownCollection(String),
    #[error("unknown field `{field}` in collection `{collection}`")]
    InvalidField { collection: String, field: String },
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("invalid projection: {0}")]
    InvalidProjection(String),
    #[error("invalid sort: {0}")]
    InvalidSort(String),
    #[error("invalid limit {0}")]
    InvalidLimit(i64),
    #[error("query execution failed: {0:#}")]
    Execution(anyhow::Error),
}

impl QueryError {
    /// True when the translated query was rejected by validation.
    pub(crate) fn is_rejected_spec(&self) -> bool {
        matches!(
            self,
            QueryError::UnknownCollection(_)
                | QueryError::InvalidField { .. }
                | QueryError::InvalidFilter(_)
                | QueryError::InvalidProjection(_)
                | QueryError::InvalidSort(_)
                | QueryError::InvalidLimit(_)
        )
    }

    /// The message shown to the end user. Internal detail stays in the logs.
    pub(crate) fn user_message(&self) -> &'static str {
        match self {
            QueryError::EmptyQuery => "Please enter a question.",
            QueryError::Translation(_) => "Could not process your query. Please try rephrasing it.",
            QueryError::Execution(_) => "Something went wrong while fetching the data.",
            _ => "Could not answer that question from the available data.",
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QueryOutcome {
    #[serde(skip)]
    pub(crate) spec: QuerySpec,
    pub(crate) data: ResultSet,
    pub(crate) presentation: Presentation,
}

/// Runs a question through compilation, execution and shaping.
pub(crate) struct QueryService<S: DataStore = Database> {
    compiler: QueryCompiler,
    executor: QueryExecutor<S>,
}

impl<S: DataStore> QueryService<S> {
    pub(crate) fn new(compiler: QueryCompiler, executor: QueryExecutor<S>) -> Self {
        Self { compiler, executor }
    }

    pub(crate) async fn run(&self, text: &str) -> Result<QueryOutcome, QueryError> {
        let result = self.answer(text).await;
        match &result {
            Ok(outcome) => info!(
                "Answered query with {} rows from {} as {:?}",
                outcome.data.len(),
                outcome.spec.collection,
                outcome.presentation.mode
            ),
            Err(e) => warn!("Query failed: {e}"),
        }
        result
    }

    async fn answer(&self, text: &str) -> Result<QueryOutcome, QueryError> {
        let spec = self.compiler.compile(text).await?;
        let data = self.executor.execute(&spec).await?;
        let presentation = shaper::shape(&data);
        Ok(QueryOutcome {
            spec,
            data,
            presentation,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use anyhow::{bail, Result};
    use serde_json::json;

    use super::*;
    use crate::database::{filter::Filter, Cursor};
    use crate::nl_query::compiler::StubTranslator;
    use crate::nl_query::shaper::PresentationMode;
    use crate::schema;
    use crate::utils::{flatten, Document};

    /// In-memory store that records how often it was asked for data.
    #[derive(Clone, Default)]
    pub(crate) struct CountingStore {
        docs: Arc<Vec<Document>>,
        pub(crate) calls: Arc<AtomicUsize>,
        failing: bool,
    }

    impl CountingStore {
        pub(crate) fn new(docs: Vec<serde_json::Value>) -> Self {
            Self {
                docs: Arc::new(docs.into_iter().map(flatten).collect()),
                ..Self::default()
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                failing: true,
                ..Self::default()
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl DataStore for CountingStore {
        fn find(&self, _collection: &str, filter: Option<Filter>) -> Result<Cursor> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing {
                bail!("connection reset");
            }
            let docs = self.docs.clone();
            let matching = (0..docs.len())
                .map(move |i| docs[i].clone())
                .filter(move |doc| filter.as_ref().is_none_or(|f| f.matches(doc)))
                .map(Ok);
            Ok(Cursor::new(matching))
        }
    }

    pub(crate) fn service(
        reply: &str,
        store: CountingStore,
    ) -> (QueryService<CountingStore>, Arc<StubTranslator>) {
        let translator = Arc::new(StubTranslator::replying(reply));
        let compiler = QueryCompiler::new(
            translator.clone(),
            schema::init(),
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        let executor = QueryExecutor::new(store, schema::init(), Limits::default());
        (QueryService::new(compiler, executor), translator)
    }

    fn monthly_sales() -> Vec<serde_json::Value> {
        (1..=6)
            .map(|m| json!({"month": format!("2024-{m:02}"), "sales": m * 10}))
            .collect()
    }

    #[tokio::test]
    async fn empty_text_never_reaches_translator() {
        let store = CountingStore::default();
        let (service, translator) = service("{}", store.clone());
        let err = service.run("   ").await.unwrap_err();
        assert!(matches!(err, QueryError::EmptyQuery));
        assert_eq!(translator.calls(), 0);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn answers_with_rows_and_presentation() {
        let store = CountingStore::new(vec![
            json!({"propertyName": "Marina Residences", "price": 1_200_000}),
            json!({"propertyName": "Jurong Heights", "price": 800_000}),
        ]);
        let (service, translator) = service(
            r#"```json
            {"collection": "Sale", "projection": {"propertyName": 1, "price": 1}, "sort": {"price": -1}}
            ```"#,
            store.clone(),
        );

        let outcome = service.run("Top sales by price").await.unwrap();
        assert_eq!(translator.calls(), 1);
        assert_eq!(store.calls(), 1);
        assert_eq!(outcome.data.len(), 2);
        assert_eq!(outcome.data[0]["propertyName"], "Marina Residences");
        assert_eq!(outcome.presentation.mode, PresentationMode::CategoricalChart);
        assert_eq!(outcome.presentation.category_field.as_deref(), Some("propertyName"));
    }

    #[tokio::test]
    async fn rejected_spec_skips_store() {
        let store = CountingStore::new(vec![json!({"price": 1})]);
        let (service, _) = service(r#"{"collection": "Users"}"#, store.clone());
        let err = service.run("list all users").await.unwrap_err();
        assert!(matches!(err, QueryError::UnknownCollection(ref c) if c == "Users"));
        assert!(err.is_rejected_spec());
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn store_failures_surface_as_execution_errors() {
        let (service, _) = service(r#"{"collection": "Sale"}"#, CountingStore::failing());
        let err = service.run("all sales").await.unwrap_err();
        assert!(matches!(err, QueryError::Execution(_)));
        assert!(!err.is_rejected_spec());
        assert_eq!(err.user_message(), "Something went wrong while fetching the data.");
    }

    #[tokio::test]
    async fn time_series_results() {
        let (service, _) = service(
            r#"{"collection": "Sale"}"#,
            CountingStore::new(monthly_sales()),
        );
        let outcome = service.run("monthly sales").await.unwrap();
        assert_eq!(outcome.presentation.mode, PresentationMode::TimeSeriesChart);
        assert_eq!(outcome.presentation.value_fields, ["sales"]);
    }

    #[test]
    fn user_messages_hide_details() {
        let err = QueryError::InvalidField {
            collection: "Sale".to_string(),
            field: "password".to_string(),
        };
        assert!(!err.user_message().contains("password"));
        let err = QueryError::from(TranslationError::Unreachable("connection refused".into()));
        assert!(err.user_message().starts_with("Could not process your query"));
    }
}
