use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use async_graphql_warp::{GraphQLBadRequest, GraphQLResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use warp::{
    filters::body::BodyDeserializeError,
    http::StatusCode,
    reject::{MethodNotAllowed, PayloadTooLarge},
    Filter, Rejection, Reply,
};

use crate::api::Schema;
use crate::nl_query::{QueryError, QueryService};

/// Largest request body accepted by the query endpoint.
const MAX_BODY: u64 = 16 * 1024;

#[derive(Debug, Deserialize)]
struct NaturalQueryRequest {
    query: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Runs the web server until the process is stopped.
pub(crate) async fn serve(schema: Schema, service: Arc<QueryService>, addr: SocketAddr) {
    info!("Listening on {addr}");
    warp::serve(routes(schema, service)).run(addr).await;
}

pub(crate) fn routes(
    schema: Schema,
    service: Arc<QueryService>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let graphql = warp::path!("graphql")
        .and(async_graphql_warp::graphql(schema))
        .and_then(
            |(schema, request): (Schema, async_graphql::Request)| async move {
                Ok::<_, Infallible>(GraphQLResponse::from(schema.execute(request).await))
            },
        );

    let natural_query = warp::path!("api" / "natural-query")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY))
        .and(warp::body::json())
        .and(warp::any().map(move || service.clone()))
        .and_then(natural_query);

    graphql.or(natural_query).recover(handle_rejection)
}

async fn natural_query(
    request: NaturalQueryRequest,
    service: Arc<QueryService>,
) -> Result<warp::reply::Response, Infallible> {
    let response = match service.run(&request.query).await {
        Ok(outcome) => warp::reply::json(&outcome).into_response(),
        Err(e) => error_reply(status_of(&e), e.user_message()).into_response(),
    };
    Ok(response)
}

fn status_of(error: &QueryError) -> StatusCode {
    match error {
        QueryError::EmptyQuery => StatusCode::BAD_REQUEST,
        QueryError::Translation(_) => StatusCode::BAD_GATEWAY,
        QueryError::Execution(_) => StatusCode::INTERNAL_SERVER_ERROR,
        e if e.is_rejected_spec() => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn error_reply(status: StatusCode, message: &str) -> impl Reply {
    let body = ErrorBody {
        error: message.to_string(),
    };
    warp::reply::with_status(warp::reply::json(&body), status)
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(GraphQLBadRequest(e)) = err.find() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<BodyDeserializeError>().is_some() {
        (
            StatusCode::BAD_REQUEST,
            "Request body must be a JSON object with a `query` string.".to_string(),
        )
    } else if err.find::<PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body is too large.".to_string())
    } else if err.find::<MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        warn!("Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };
    Ok(error_reply(status, &message))
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use warp::http::StatusCode;

    use super::routes;
    use crate::api::TestSchema;
    use crate::database::sale::test_sale;

    async fn post(schema: &TestSchema, body: &str) -> (StatusCode, Value) {
        let filter = routes(schema.schema.clone(), schema.service.clone());
        let res = warp::test::request()
            .method("POST")
            .path("/api/natural-query")
            .header("content-type", "application/json")
            .body(body.to_string())
            .reply(&filter)
            .await;
        let body = serde_json::from_slice(res.body()).unwrap();
        (res.status(), body)
    }

    #[tokio::test]
    async fn answers_with_data_and_presentation() {
        let schema = TestSchema::with_reply(
            r#"{"collection": "Sale", "filter": {"location.city": "Jurong"}, "projection": {"propertyId": 1, "price": 1}}"#,
        );
        schema
            .db
            .insert_many(&[test_sale(1, "Jurong", 800_000), test_sale(2, "Woodlands", 900_000)])
            .unwrap();

        let (status, body) = post(&schema, r#"{"query": "sales in jurong"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"],
            json!([{"propertyId": "PROP001", "price": 800_000}])
        );
        assert_eq!(body["presentation"]["mode"], "categorical-chart");
    }

    #[tokio::test]
    async fn maps_errors_to_status() {
        let schema = TestSchema::with_reply(r#"{"collection": "Users"}"#);
        let (status, body) = post(&schema, r#"{"query": "list users"}"#).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].is_string());

        let (status, _) = post(&schema, r#"{"query": "   "}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = post(&schema, "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("query"));

        let schema = TestSchema::with_reply("sorry, I cannot help with that");
        let (status, _) = post(&schema, r#"{"query": "hello"}"#).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn serves_graphql() {
        let schema = TestSchema::new();
        let filter = routes(schema.schema.clone(), schema.service.clone());
        let res = warp::test::request()
            .method("POST")
            .path("/graphql")
            .json(&json!({"query": "{ salesSummary { totalSales } }"}))
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["data"]["salesSummary"]["totalSales"], 0);
    }
}
