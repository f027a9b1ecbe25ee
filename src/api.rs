//! HTTP surface for sitebrief.
//!
//! - `GET /` – Readiness message plus Meilisearch reachability.
//! - `POST /crawl_markdown` – Crawl a URL and return `{ summary, markdown }`.
//! - `POST /index` – Upsert `{ id, title?, content, ad? }` after provisioning the index.
//! - `POST /search` – Hybrid search with `{ query, top_k = 5, semantic_ratio = 1.0 }`.
//! - `POST /documents/clear` – Delete every document in the index.
//! - `GET /metrics` – Request counters.
//! - `GET /commands` – Machine-readable command catalog.
//!
//! Every pipeline failure is answered with `500 { "detail": ... }` carrying the upstream text.
//! Bodies that fail to parse keep axum's status code but use the same `{ "detail" }` shape.

use crate::meili::{Document, SearchHit, SearchRequest, SearchRequestError};
use crate::metrics::MetricsSnapshot;
use crate::processing::{ProcessingApi, ProcessingError};
use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{FromRequest, Request, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use std::sync::Arc;

const READY_MESSAGE: &str = "Meilisearch + OpenAI embedder (auto-embedding) service ready.";

/// Build the HTTP router.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: ProcessingApi + 'static,
{
    Router::new()
        .route("/", get(root::<S>))
        .route("/crawl_markdown", post(crawl_markdown::<S>))
        .route("/index", post(index_document::<S>))
        .route("/search", post(search_documents::<S>))
        .route("/documents/clear", post(clear_documents::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
    meilisearch: String,
}

async fn root<S>(State(service): State<Arc<S>>) -> Json<RootResponse>
where
    S: ProcessingApi,
{
    let health = service.health().await;
    let meilisearch = match (health.reachable, health.error) {
        (true, _) => "available".to_string(),
        (false, Some(error)) => error,
        (false, None) => "unavailable".to_string(),
    };
    Json(RootResponse {
        message: READY_MESSAGE,
        meilisearch,
    })
}

/// Request body for `POST /crawl_markdown`.
#[derive(Deserialize)]
struct CrawlRequest {
    url: String,
}

#[derive(Serialize)]
struct CrawlResponse {
    summary: String,
    markdown: String,
}

async fn crawl_markdown<S>(
    State(service): State<Arc<S>>,
    ApiJson(request): ApiJson<CrawlRequest>,
) -> Result<Json<CrawlResponse>, AppError>
where
    S: ProcessingApi,
{
    tracing::info!(url = %request.url, "Crawl request received");
    let result = service.crawl_markdown(&request.url).await?;
    Ok(Json(CrawlResponse {
        summary: result.summary,
        markdown: result.markdown,
    }))
}

#[derive(Serialize)]
struct IndexResponse {
    result: &'static str,
    id: i64,
}

async fn index_document<S>(
    State(service): State<Arc<S>>,
    ApiJson(document): ApiJson<Document>,
) -> Result<Json<IndexResponse>, AppError>
where
    S: ProcessingApi,
{
    let outcome = service.index_document(document).await?;
    Ok(Json(IndexResponse {
        result: "indexed",
        id: outcome.id,
    }))
}

async fn search_documents<S>(
    State(service): State<Arc<S>>,
    ApiJson(request): ApiJson<SearchRequest>,
) -> Result<Json<Vec<SearchHit>>, AppError>
where
    S: ProcessingApi,
{
    request.validate().map_err(AppError::Validation)?;
    tracing::info!(
        query_chars = request.query.chars().count(),
        top_k = request.top_k,
        semantic_ratio = request.semantic_ratio,
        "Search request received"
    );
    let hits = service.search_documents(request).await?;
    Ok(Json(hits))
}

async fn clear_documents<S>(
    State(service): State<Arc<S>>,
) -> Result<Json<serde_json::Value>, AppError>
where
    S: ProcessingApi,
{
    service.clear_documents().await?;
    Ok(Json(json!({ "result": "index cleared" })))
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: ProcessingApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "crawl_markdown",
                method: "POST",
                path: "/crawl_markdown",
                description: "Crawl a page and return an LLM marketing summary with the extracted markdown.",
                request_example: Some(json!({ "url": "https://example.com" })),
            },
            CommandDescriptor {
                name: "index",
                method: "POST",
                path: "/index",
                description: "Provision the index and embedder, then upsert one document.",
                request_example: Some(json!({
                    "id": 2000,
                    "title": "https://example.com",
                    "content": "Summary text",
                    "ad": "Optional ad copy"
                })),
            },
            CommandDescriptor {
                name: "search",
                method: "POST",
                path: "/search",
                description: "Hybrid keyword/vector search; semantic_ratio 1.0 is pure semantic.",
                request_example: Some(json!({
                    "query": "handmade candles",
                    "top_k": 5,
                    "semantic_ratio": 1.0
                })),
            },
            CommandDescriptor {
                name: "clear",
                method: "POST",
                path: "/documents/clear",
                description: "Irreversibly delete every document in the index.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return request counters.",
                request_example: None,
            },
        ],
    })
}

/// JSON body extractor whose rejections use the `{ "detail" }` error shape.
struct ApiJson<T>(T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state)
            .await
            .map_err(AppError::Body)?;
        Ok(Self(value))
    }
}

enum AppError {
    Processing(ProcessingError),
    Validation(SearchRequestError),
    Body(JsonRejection),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::Processing(error) => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
            Self::Validation(error) => (StatusCode::UNPROCESSABLE_ENTITY, error.to_string()),
            Self::Body(rejection) => {
                tracing::debug!(error = %rejection, "Rejected request body");
                (rejection.status(), rejection.body_text())
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<ProcessingError> for AppError {
    fn from(inner: ProcessingError) -> Self {
        Self::Processing(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{create_router, get_commands};
    use crate::crawl::CrawlError;
    use crate::meili::{Document, SearchHit, SearchRequest};
    use crate::metrics::MetricsSnapshot;
    use crate::processing::{
        CrawlResult, HealthSnapshot, IndexOutcome, ProcessingApi, ProcessingError,
    };
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct StubProcessingService {
        documents: Mutex<Vec<Document>>,
        searches: Mutex<Vec<SearchRequest>>,
        hits: Vec<SearchHit>,
        fail_crawl: bool,
    }

    #[async_trait]
    impl ProcessingApi for StubProcessingService {
        async fn crawl_markdown(&self, url: &str) -> Result<CrawlResult, ProcessingError> {
            if self.fail_crawl {
                return Err(CrawlError::EmptyContent(url.to_string()).into());
            }
            Ok(CrawlResult {
                url: url.to_string(),
                markdown: "# Shop".into(),
                summary: "[Product type: Tea] Fine tea.".into(),
            })
        }

        async fn index_document(
            &self,
            document: Document,
        ) -> Result<IndexOutcome, ProcessingError> {
            let id = document.id;
            self.documents.lock().await.push(document);
            Ok(IndexOutcome { id, task_uid: 1 })
        }

        async fn search_documents(
            &self,
            request: SearchRequest,
        ) -> Result<Vec<SearchHit>, ProcessingError> {
            self.searches.lock().await.push(request);
            Ok(self.hits.clone())
        }

        async fn clear_documents(&self) -> Result<(), ProcessingError> {
            self.documents.lock().await.clear();
            Ok(())
        }

        async fn health(&self) -> HealthSnapshot {
            HealthSnapshot {
                reachable: true,
                error: None,
            }
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot::default()
        }
    }

    async fn call(
        service: Arc<StubProcessingService>,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let app = create_router(service);
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn commands_catalog_lists_pipeline_endpoints() {
        let commands = get_commands().await.0.commands;
        let paths: Vec<_> = commands.iter().map(|cmd| cmd.path).collect();
        assert!(paths.contains(&"/crawl_markdown"));
        assert!(paths.contains(&"/documents/clear"));
    }

    #[tokio::test]
    async fn root_reports_readiness() {
        let (status, body) = call(Arc::default(), Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().contains("ready"));
        assert_eq!(body["meilisearch"], "available");
    }

    #[tokio::test]
    async fn crawl_returns_summary_and_markdown() {
        let (status, body) = call(
            Arc::default(),
            Method::POST,
            "/crawl_markdown",
            Some(json!({ "url": "https://tea.example" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], "[Product type: Tea] Fine tea.");
        assert_eq!(body["markdown"], "# Shop");
    }

    #[tokio::test]
    async fn crawl_failure_maps_to_500_detail() {
        let service = Arc::new(StubProcessingService {
            fail_crawl: true,
            ..Default::default()
        });
        let (status, body) = call(
            service,
            Method::POST,
            "/crawl_markdown",
            Some(json!({ "url": "https://empty.example" })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().contains("No content extracted"));
    }

    #[tokio::test]
    async fn index_echoes_id() {
        let service = Arc::new(StubProcessingService::default());
        let (status, body) = call(
            service.clone(),
            Method::POST,
            "/index",
            Some(json!({ "id": 1, "content": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "result": "indexed", "id": 1 }));
        let stored = service.documents.lock().await;
        assert_eq!(stored[0].content, "hello");
        assert_eq!(stored[0].title, None);
    }

    #[tokio::test]
    async fn search_applies_defaults_and_passes_hits_through() {
        let hits: Vec<SearchHit> = serde_json::from_value(json!([
            { "id": 2, "title": "b", "content": "second", "_semanticScore": 0.7 },
            { "id": 1, "title": "a", "content": "first", "_semanticScore": 0.9 }
        ]))
        .unwrap();
        let service = Arc::new(StubProcessingService {
            hits,
            ..Default::default()
        });
        let (status, body) = call(
            service.clone(),
            Method::POST,
            "/search",
            Some(json!({ "query": "tea" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], 2);
        assert_eq!(body[1]["_semanticScore"], 0.9);
        let searches = service.searches.lock().await;
        assert_eq!(searches[0].top_k, 5);
        assert_eq!(searches[0].semantic_ratio, 1.0);
    }

    #[tokio::test]
    async fn search_rejects_out_of_range_ratio() {
        let service = Arc::new(StubProcessingService::default());
        let (status, body) = call(
            service.clone(),
            Method::POST,
            "/search",
            Some(json!({ "query": "tea", "semantic_ratio": 2.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().contains("semantic_ratio"));
        assert!(service.searches.lock().await.is_empty());
    }

    #[tokio::test]
    async fn clear_confirms_wipe() {
        let (status, body) = call(Arc::default(), Method::POST, "/documents/clear", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "result": "index cleared" }));
    }

    #[tokio::test]
    async fn malformed_body_uses_detail_shape() {
        let service = Arc::new(StubProcessingService::default());
        let response = create_router(service.clone())
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/index")
                    .header("content-type", "application/json")
                    .body(Body::from("{\"id\": 1, \"content\""))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let body: Value = serde_json::from_slice(&bytes).expect("json detail");
        assert!(body["detail"].as_str().is_some_and(|detail| !detail.is_empty()));
        assert!(service.documents.lock().await.is_empty());
    }

    #[tokio::test]
    async fn missing_field_is_unprocessable_with_detail() {
        let (status, body) = call(
            Arc::default(),
            Method::POST,
            "/index",
            Some(json!({ "id": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().contains("content"));
    }
}
