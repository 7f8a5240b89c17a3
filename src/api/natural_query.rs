use std::sync::Arc;

use async_graphql::{Context, Json, Object, Result, SimpleObject};

use crate::nl_query::{Presentation, QueryService};
use crate::utils::Document;

#[derive(Default)]
pub(super) struct NaturalQueryQuery;

#[derive(SimpleObject)]
struct NaturalQueryResult {
    /// The matching records, with nested fields flattened to dotted names.
    rows: Json<Vec<Document>>,
    presentation: Presentation,
}

#[Object]
impl NaturalQueryQuery {
    /// Answers a free-text question about the stored data.
    async fn natural_query(&self, ctx: &Context<'_>, query: String) -> Result<NaturalQueryResult> {
        let service = ctx.data::<Arc<QueryService>>()?;
        let outcome = service
            .run(&query)
            .await
            .map_err(|e| async_graphql::Error::new(e.user_message()))?;
        Ok(NaturalQueryResult {
            rows: Json(outcome.data),
            presentation: outcome.presentation,
        })
    }
}
