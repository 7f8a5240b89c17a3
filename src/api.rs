mod dashboard;
mod feedback;
mod intent;
mod natural_query;

use std::sync::Arc;

use async_graphql::{Context, EmptySubscription, MergedObject, Result};

use crate::database::{Database, Record};
use crate::nl_query::QueryService;
use crate::sentiment::{KeywordSentiment, SentimentScorer};

/// A set of queries defined in the schema.
///
/// This is exposed only for [`Schema`], and not used directly.
#[derive(Default, MergedObject)]
pub(crate) struct Query(
    dashboard::DashboardQuery,
    feedback::FeedbackQuery,
    intent::IntentQuery,
    natural_query::NaturalQueryQuery,
);

/// A set of mutations defined in the schema.
#[derive(Default, MergedObject)]
pub(crate) struct Mutation(feedback::FeedbackMutation);

pub(crate) type Schema = async_graphql::Schema<Query, Mutation, EmptySubscription>;

/// Scorer applied to submitted feedback that arrives without a sentiment.
pub(crate) type FeedbackScorer = Arc<dyn SentimentScorer>;

pub(crate) fn schema(database: Database, queries: Arc<QueryService>) -> Schema {
    let scorer: FeedbackScorer = Arc::new(KeywordSentiment::feedback_form());
    Schema::build(Query::default(), Mutation::default(), EmptySubscription)
        .data(database)
        .data(queries)
        .data(scorer)
        .finish()
}

/// Reads every record of one type.
fn load<R: Record>(ctx: &Context<'_>) -> Result<Vec<R>> {
    let db = ctx.data::<Database>()?;
    db.records::<R>()
        .collect::<anyhow::Result<Vec<_>>>()
        .map_err(|e| format!("failed to read database: {e}").into())
}

#[cfg(test)]
pub(crate) struct TestSchema {
    _dir: tempfile::TempDir, // to prevent the data directory from being deleted while the test is running
    pub(crate) db: Database,
    pub(crate) schema: Schema,
    pub(crate) service: Arc<QueryService>,
}

#[cfg(test)]
impl TestSchema {
    pub(crate) fn new() -> Self {
        Self::with_reply(r#"{"collection": "Sale"}"#)
    }

    /// A schema whose translator always answers with `reply`.
    pub(crate) fn with_reply(reply: &str) -> Self {
        use crate::nl_query::{compiler::StubTranslator, Limits, QueryCompiler, QueryExecutor};

        let db_dir = tempfile::tempdir().unwrap();
        let db = Database::connect(db_dir.path()).unwrap();
        let registry = crate::schema::init();
        let compiler = QueryCompiler::new(
            Arc::new(StubTranslator::replying(reply)),
            registry,
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        let executor = QueryExecutor::new(db.clone(), registry, Limits::default());
        let service = Arc::new(QueryService::new(compiler, executor));
        let schema = schema(db.clone(), service.clone());
        Self {
            _dir: db_dir,
            db,
            schema,
            service,
        }
    }

    pub(crate) async fn execute(&self, query: &str) -> async_graphql::Response {
        let request: async_graphql::Request = query.into();
        self.schema.execute(request).await
    }
}
