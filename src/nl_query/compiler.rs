use std::{sync::Arc, time::Duration};

use anyhow::{ensure, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use super::{QueryError, QuerySpec};
use crate::schema::SchemaRegistry;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub(crate) enum TranslationError {
    #[error("translation service unreachable: {0}")]
    Unreachable(String),
    #[error("translation timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed translation: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TranslationRequest {
    pub(crate) instructions: String,
    pub(crate) schema_description: Value,
    pub(crate) user_query: String,
}

/// A text-completion service that turns a request into JSON text.
#[async_trait]
pub(crate) trait Translator: Send + Sync {
    async fn translate(&self, request: &TranslationRequest) -> Result<String, TranslationError>;
}

pub(crate) struct QueryCompiler {
    translator: Arc<dyn Translator>,
    registry: &'static SchemaRegistry,
    timeout: Duration,
}

impl QueryCompiler {
    pub(crate) fn new(
        translator: Arc<dyn Translator>,
        registry: &'static SchemaRegistry,
        timeout: Duration,
    ) -> Result<Self> {
        ensure!(!registry.is_empty(), "schema registry has no collections");
        ensure!(!timeout.is_zero(), "translation timeout must be positive");
        Ok(Self {
            translator,
            registry,
            timeout,
        })
    }

    /// Translates free text into a [`QuerySpec`]. Collection and field
    /// names are not checked here.
    pub(crate) async fn compile(&self, text: &str) -> Result<QuerySpec, QueryError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        let request = TranslationRequest {
            instructions: self.instructions(),
            schema_description: self.registry.describe(),
            user_query: text.to_string(),
        };

        let start = std::time::Instant::now();
        let reply = tokio::time::timeout(self.timeout, self.translator.translate(&request))
            .await
            .map_err(|_| TranslationError::Timeout(self.timeout))??;
        debug!("Translator replied in {:.2?}: {reply}", start.elapsed());

        let spec = parse_reply(&reply)?;
        info!("Translated query into {}", spec.collection);
        Ok(spec)
    }

    fn instructions(&self) -> String {
        let today = chrono::Utc::now().format("%Y-%m-%d");
        let collections = self.registry.names().collect::<Vec<_>>().join(", ");
        let spec_schema = serde_json::to_string_pretty(&schemars::schema_for!(QuerySpec))
            .unwrap_or_default();
        format!(
            "You translate questions about real-estate sales into database queries.\n\n\
            Rules:\n\
            - Return only a single JSON object, with no explanation.\n\
            - The object has a required `collection` and optional `filter`, `projection`, `sort` and `limit`.\n\
            - `collection` must be one of: {collections}.\n\
            - Use only fields listed in the schema description, with dotted paths for nested fields such as `location.city`.\n\
            - Filters may use $eq, $ne, $gt, $gte, $lt, $lte, $in, $nin, $regex, $options, $exists, $and, $or and $nor.\n\
            - Write dates as ISO 8601 strings.\n\
            - Use $regex with $options \"i\" when matching names or places the user may have typed in a different case.\n\
            - Today's date is {today}.\n\
            - Timezone: UTC.\n\n\
            JSON schema of the answer:\n{spec_schema}\n"
        )
    }
}

/// Extracts the JSON object from a model reply, tolerating a Markdown code
/// fence or chatter around it.
fn parse_reply(reply: &str) -> Result<QuerySpec, TranslationError> {
    let cleaned = reply.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();
    let body = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => &cleaned[start..=end],
        _ => {
            return Err(TranslationError::Malformed(
                "reply does not contain a JSON object".to_string(),
            ))
        }
    };
    serde_json::from_str(body).map_err(|e| TranslationError::Malformed(e.to_string()))
}

#[cfg(test)]
pub(crate) struct StubTranslator {
    reply: Result<String, TranslationError>,
    delay: Option<Duration>,
    calls: std::sync::atomic::AtomicUsize,
    finished: std::sync::atomic::AtomicUsize,
    last_request: std::sync::Mutex<Option<TranslationRequest>>,
}

#[cfg(test)]
impl StubTranslator {
    pub(crate) fn replying(reply: &str) -> Self {
        Self::new(Ok(reply.to_string()))
    }

    pub(crate) fn failing(error: TranslationError) -> Self {
        Self::new(Err(error))
    }

    fn new(reply: Result<String, TranslationError>) -> Self {
        Self {
            reply,
            delay: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
            finished: std::sync::atomic::AtomicUsize::new(0),
            last_request: std::sync::Mutex::new(None),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl Translator for StubTranslator {
    async fn translate(&self, request: &TranslationRequest) -> Result<String, TranslationError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.finished.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.reply.clone()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::{self, SchemaRegistry};

    fn compiler(translator: Arc<StubTranslator>) -> QueryCompiler {
        QueryCompiler::new(translator, schema::init(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn sends_schema_and_question() {
        let translator = Arc::new(StubTranslator::replying(
            r#"{"collection": "Sale", "filter": {"location.city": "Woodlands"}, "limit": 5}"#,
        ));
        let spec = compiler(translator.clone())
            .compile("  five sales in Woodlands ")
            .await
            .unwrap();
        assert_eq!(spec.collection, "Sale");
        assert_eq!(spec.filter, Some(json!({"location.city": "Woodlands"})));
        assert_eq!(spec.limit, Some(5));

        let request = translator.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.user_query, "five sales in Woodlands");
        assert_eq!(request.schema_description["Sale"]["price"], "number");
        assert!(request.instructions.contains("Sale, Property, Feedback"));
        assert!(request.instructions.contains("Today's date is"));

        let wire = serde_json::to_value(&request).unwrap();
        assert!(wire.get("schemaDescription").is_some());
        assert!(wire.get("userQuery").is_some());
    }

    #[tokio::test]
    async fn rejects_empty_text_before_translating() {
        let translator = Arc::new(StubTranslator::replying("{}"));
        let err = compiler(translator.clone()).compile(" \n\t").await.unwrap_err();
        assert!(matches!(err, QueryError::EmptyQuery));
        assert_eq!(translator.calls(), 0);
    }

    #[tokio::test]
    async fn does_not_check_names() {
        let translator = Arc::new(StubTranslator::replying(
            r#"{"collection": "Users", "filter": {"password": "x"}}"#,
        ));
        let spec = compiler(translator).compile("users").await.unwrap();
        assert_eq!(spec.collection, "Users");
    }

    #[tokio::test]
    async fn malformed_replies() {
        for reply in [
            "I cannot help with that.",
            "{}",
            r#"{"collection": 5}"#,
            r#"{"collection": "Sale", "limit": "ten"}"#,
            "{ not json }",
        ] {
            let translator = Arc::new(StubTranslator::replying(reply));
            let err = compiler(translator).compile("anything").await.unwrap_err();
            assert!(
                matches!(err, QueryError::Translation(TranslationError::Malformed(_))),
                "{reply}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn service_errors_pass_through() {
        let translator = Arc::new(StubTranslator::failing(TranslationError::Unreachable(
            "connection refused".to_string(),
        )));
        let err = compiler(translator).compile("anything").await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::Translation(TranslationError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn slow_translator_times_out() {
        let mut stub = StubTranslator::replying(r#"{"collection": "Sale"}"#);
        stub.delay = Some(Duration::from_secs(30));
        let timeout = Duration::from_millis(50);
        let compiler = QueryCompiler::new(Arc::new(stub), schema::init(), timeout).unwrap();
        let err = compiler.compile("anything").await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::Translation(TranslationError::Timeout(d)) if d == timeout
        ));
    }

    #[test]
    fn strips_code_fences_and_chatter() {
        let spec = parse_reply(
            "Here is the query:\n```json\n{\"collection\": \"Property\", \"sort\": {\"price\": -1}}\n```",
        )
        .unwrap();
        assert_eq!(spec.collection, "Property");
        assert_eq!(spec.sort, Some(json!({"price": -1})));
    }

    #[test]
    fn needs_a_populated_registry() {
        static EMPTY: std::sync::OnceLock<SchemaRegistry> = std::sync::OnceLock::new();
        let empty = EMPTY.get_or_init(|| SchemaRegistry::new(Vec::new()));
        let translator = Arc::new(StubTranslator::replying("{}"));
        assert!(QueryCompiler::new(translator.clone(), empty, Duration::from_secs(1)).is_err());
        assert!(QueryCompiler::new(translator, schema::init(), Duration::ZERO).is_err());
    }

    #[tokio::test]
    async fn dropping_compile_abandons_translation() {
        let mut stub = StubTranslator::replying(r#"{"collection": "Sale"}"#);
        stub.delay = Some(Duration::from_millis(200));
        let stub = Arc::new(stub);
        let compiler = compiler(stub.clone());

        // The caller gives up long before the translator would answer.
        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), compiler.compile("anything")).await;
        assert!(abandoned.is_err());
        assert_eq!(stub.calls(), 1);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(stub.finished.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
