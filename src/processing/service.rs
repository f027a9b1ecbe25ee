//! Processing service coordinating crawling, summarization, and Meilisearch operations.

use crate::{
    completion::{CompletionClient, OpenAiClient},
    config::Config,
    crawl::{HttpCrawler, PageFetcher},
    meili::{Document, MeiliError, MeiliService, Provisioner, SearchHit, SearchRequest},
    metrics::{MetricsSnapshot, ServiceMetrics},
    processing::types::{CrawlResult, HealthSnapshot, IndexOutcome, ProcessingError},
    summary::{RefusalPhraseValidator, Summarizer, SummarySettings, SummaryValidator},
};
use async_trait::async_trait;
use std::time::Duration;

const TASK_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Abstraction over the orchestration pipeline used by the HTTP surface.
#[async_trait]
pub trait ProcessingApi: Send + Sync {
    /// Crawl `url` and summarize the extracted text.
    async fn crawl_markdown(&self, url: &str) -> Result<CrawlResult, ProcessingError>;

    /// Provision the index and upsert `document`.
    async fn index_document(&self, document: Document) -> Result<IndexOutcome, ProcessingError>;

    /// Provision the index and run a hybrid search.
    async fn search_documents(
        &self,
        request: SearchRequest,
    ) -> Result<Vec<SearchHit>, ProcessingError>;

    /// Delete every indexed document.
    async fn clear_documents(&self) -> Result<(), ProcessingError>;

    /// Probe the search engine.
    async fn health(&self) -> HealthSnapshot;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Coordinates the crawl → summarize flow and the index/search/clear calls.
///
/// Holds no per-request state: configuration is read-only after construction and every
/// request provisions (or checks the provisioning cache) on its own. Build it once at startup
/// and share it through an `Arc`.
pub struct ProcessingService {
    config: Config,
    crawler: Box<dyn PageFetcher>,
    completion: Option<Box<dyn CompletionClient>>,
    validator: Box<dyn SummaryValidator>,
    summary_settings: SummarySettings,
    meili: MeiliService,
    provisioner: Provisioner,
    metrics: ServiceMetrics,
}

impl ProcessingService {
    /// Build the service with the HTTP crawler, the OpenAI client, and the default validator.
    ///
    /// A missing `OPENAI_API_KEY` is not fatal here; requests that need it fail instead.
    pub fn new(config: &Config) -> Result<Self, ProcessingError> {
        let crawler =
            HttpCrawler::new(config).map_err(|error| ProcessingError::Setup(error.to_string()))?;
        let completion = match config.openai_api_key.as_deref() {
            Some(key) => Some(Box::new(
                OpenAiClient::new(config, key)
                    .map_err(|error| ProcessingError::Setup(error.to_string()))?,
            ) as Box<dyn CompletionClient>),
            None => {
                tracing::warn!("OPENAI_API_KEY is not set; summarize, index, and search will fail");
                None
            }
        };
        let meili =
            MeiliService::new(config).map_err(|error| ProcessingError::Setup(error.to_string()))?;

        Ok(Self::from_parts(
            config.clone(),
            Box::new(crawler),
            completion,
            Box::new(RefusalPhraseValidator::default()),
            meili,
        ))
    }

    /// Assemble the service from explicit collaborators.
    pub fn from_parts(
        config: Config,
        crawler: Box<dyn PageFetcher>,
        completion: Option<Box<dyn CompletionClient>>,
        validator: Box<dyn SummaryValidator>,
        meili: MeiliService,
    ) -> Self {
        Self {
            summary_settings: SummarySettings::from_config(&config),
            provisioner: Provisioner::new(config.provision_mode),
            config,
            crawler,
            completion,
            validator,
            meili,
            metrics: ServiceMetrics::new(),
        }
    }

    /// Run index and embedder provisioning when the policy requires it.
    pub async fn ensure_ready(&self) -> Result<(), ProcessingError> {
        let key = self.config.require_openai_key()?;
        if !self.provisioner.needs_provisioning() {
            return Ok(());
        }
        self.meili.ensure_ready(key).await.map_err(|error| {
            self.provisioner.invalidate();
            ProcessingError::Index(error)
        })?;
        self.provisioner.mark_ready();
        Ok(())
    }

    /// Invalidate the provisioning cache after a Meilisearch failure.
    fn meili_failed(&self, error: MeiliError) -> MeiliError {
        self.provisioner.invalidate();
        error
    }

    async fn settle(&self, task_uid: u64) -> Result<(), MeiliError> {
        if self.config.wait_for_tasks {
            self.meili.wait_for_task(task_uid, TASK_WAIT_TIMEOUT).await?;
        }
        Ok(())
    }

    fn observe<T>(&self, result: Result<T, ProcessingError>) -> Result<T, ProcessingError> {
        if let Err(error) = &result {
            self.metrics.record_failure();
            tracing::error!(error = %error, "Request failed");
        }
        result
    }

    async fn crawl_and_summarize(&self, url: &str) -> Result<CrawlResult, ProcessingError> {
        self.config.require_openai_key()?;
        let client = self.completion.as_deref().ok_or_else(|| {
            ProcessingError::Setup("completion client is not configured".into())
        })?;

        let markdown = self.crawler.fetch_markdown(url).await?;
        let summary = Summarizer::new(client, self.validator.as_ref(), &self.summary_settings)
            .summarize(&markdown)
            .await?;

        self.metrics.record_summary();
        tracing::info!(url, summary_chars = summary.chars().count(), "Page summarized");
        Ok(CrawlResult {
            url: url.to_string(),
            markdown,
            summary,
        })
    }

    async fn index(&self, document: Document) -> Result<IndexOutcome, ProcessingError> {
        self.ensure_ready().await?;
        let task = self
            .meili
            .add_document(&document)
            .await
            .map_err(|error| ProcessingError::Index(self.meili_failed(error)))?;
        self.settle(task.task_uid)
            .await
            .map_err(|error| ProcessingError::Index(self.meili_failed(error)))?;

        self.metrics.record_index();
        tracing::info!(
            index = %self.meili.index_uid(),
            id = document.id,
            task = task.task_uid,
            "Document indexed"
        );
        Ok(IndexOutcome {
            id: document.id,
            task_uid: task.task_uid,
        })
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchHit>, ProcessingError> {
        self.ensure_ready().await.map_err(|error| match error {
            ProcessingError::Index(inner) => ProcessingError::Search(inner),
            other => other,
        })?;
        let hits = self
            .meili
            .search(&request)
            .await
            .map_err(|error| ProcessingError::Search(self.meili_failed(error)))?;

        self.metrics.record_search();
        tracing::info!(
            index = %self.meili.index_uid(),
            top_k = request.top_k,
            semantic_ratio = request.semantic_ratio,
            hits = hits.len(),
            "Search completed"
        );
        Ok(hits)
    }

    async fn clear(&self) -> Result<(), ProcessingError> {
        self.ensure_ready().await.map_err(|error| match error {
            ProcessingError::Index(inner) => ProcessingError::Clear(inner),
            other => other,
        })?;
        let task = self
            .meili
            .clear_documents()
            .await
            .map_err(|error| ProcessingError::Clear(self.meili_failed(error)))?;
        self.meili
            .wait_for_task(task.task_uid, TASK_WAIT_TIMEOUT)
            .await
            .map_err(|error| ProcessingError::Clear(self.meili_failed(error)))?;

        self.metrics.record_clear();
        tracing::warn!(index = %self.meili.index_uid(), "All documents cleared");
        Ok(())
    }
}

#[async_trait]
impl ProcessingApi for ProcessingService {
    async fn crawl_markdown(&self, url: &str) -> Result<CrawlResult, ProcessingError> {
        let result = self.crawl_and_summarize(url).await;
        self.observe(result)
    }

    async fn index_document(&self, document: Document) -> Result<IndexOutcome, ProcessingError> {
        let result = self.index(document).await;
        self.observe(result)
    }

    async fn search_documents(
        &self,
        request: SearchRequest,
    ) -> Result<Vec<SearchHit>, ProcessingError> {
        let result = self.search(request).await;
        self.observe(result)
    }

    async fn clear_documents(&self) -> Result<(), ProcessingError> {
        let result = self.clear().await;
        self.observe(result)
    }

    async fn health(&self) -> HealthSnapshot {
        match self.meili.health().await {
            Ok(()) => HealthSnapshot {
                reachable: true,
                error: None,
            },
            Err(error) => HealthSnapshot {
                reachable: false,
                error: Some(error.to_string()),
            },
        }
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{CompletionError, CompletionRequest};
    use crate::config::ProvisionMode;
    use crate::crawl::CrawlError;
    use crate::summary::SummaryError;
    use httpmock::{
        Method::{DELETE, GET, PATCH, POST},
        MockServer,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StaticPage(&'static str);

    #[async_trait]
    impl PageFetcher for StaticPage {
        async fn fetch_markdown(&self, url: &str) -> Result<String, CrawlError> {
            if self.0.is_empty() {
                Err(CrawlError::EmptyContent(url.to_string()))
            } else {
                Ok(self.0.to_string())
            }
        }
    }

    struct CountingCompletion {
        reply: &'static str,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CompletionClient for CountingCompletion {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.to_string())
        }
    }

    fn config(server: &MockServer, mode: ProvisionMode) -> Config {
        Config {
            meili_url: server.base_url(),
            meili_index: "documents".into(),
            openai_api_key: Some("sk-test".into()),
            provision_mode: mode,
            ..Config::default()
        }
    }

    fn build(
        config: Config,
        page: &'static str,
        reply: &'static str,
    ) -> (ProcessingService, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let meili = MeiliService::new(&config).expect("meili");
        let service = ProcessingService::from_parts(
            config,
            Box::new(StaticPage(page)),
            Some(Box::new(CountingCompletion {
                reply,
                calls: calls.clone(),
            })),
            Box::new(RefusalPhraseValidator::default()),
            meili,
        );
        (service, calls)
    }

    async fn mock_provisioning(server: &MockServer) -> httpmock::Mock<'_> {
        server
            .mock_async(|when, then| {
                when.method(PATCH).path("/experimental-features");
                then.status(200).json_body(json!({ "vectorStore": true }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/indexes/documents");
                then.status(200).json_body(json!({ "uid": "documents", "primaryKey": "id" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(PATCH).path("/indexes/documents/settings/embedders");
                then.status(202).json_body(json!({ "taskUid": 1, "status": "enqueued" }));
            })
            .await
    }

    #[tokio::test]
    async fn empty_crawl_never_reaches_the_model() {
        let server = MockServer::start_async().await;
        let (service, calls) = build(config(&server, ProvisionMode::Always), "", "unused");

        let error = service
            .crawl_markdown("https://empty.example")
            .await
            .expect_err("empty page");

        assert!(matches!(error, ProcessingError::Crawl(CrawlError::EmptyContent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.metrics_snapshot().failures, 1);
    }

    #[tokio::test]
    async fn crawl_returns_summary_and_markdown() {
        let server = MockServer::start_async().await;
        let (service, calls) = build(
            config(&server, ProvisionMode::Always),
            "Hand-poured soy candles",
            "[Product type: Candles] Warm light for every room.",
        );

        let result = service
            .crawl_markdown("https://candles.example")
            .await
            .expect("summary");

        assert_eq!(result.markdown, "Hand-poured soy candles");
        assert!(result.summary.starts_with("[Product type: Candles]"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.metrics_snapshot().pages_summarized, 1);
    }

    #[tokio::test]
    async fn refusal_surfaces_as_summary_error() {
        let server = MockServer::start_async().await;
        let (service, _) = build(
            config(&server, ProvisionMode::Always),
            "Some page",
            "I'm sorry, I can't help with that.",
        );

        let error = service
            .crawl_markdown("https://refuse.example")
            .await
            .expect_err("refusal");
        assert!(matches!(error, ProcessingError::Summary(SummaryError::Invalid(_))));
    }

    #[tokio::test]
    async fn missing_api_key_fails_each_request() {
        let server = MockServer::start_async().await;
        let mut config = config(&server, ProvisionMode::Always);
        config.openai_api_key = None;
        let (service, _) = build(config, "page", "copy");

        assert!(matches!(
            service.crawl_markdown("https://a.example").await,
            Err(ProcessingError::Configuration(_))
        ));
        assert!(matches!(
            service.search_documents(SearchRequest::new("q")).await,
            Err(ProcessingError::Configuration(_))
        ));
        assert!(matches!(
            service
                .index_document(Document {
                    id: 1,
                    title: None,
                    content: "hello".into(),
                    ad: None,
                })
                .await,
            Err(ProcessingError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn once_mode_provisions_a_single_time() {
        let server = MockServer::start_async().await;
        let embedders = mock_provisioning(&server).await;
        let search = server
            .mock_async(|when, then| {
                when.method(POST).path("/indexes/documents/search");
                then.status(200).json_body(json!({ "hits": [] }));
            })
            .await;
        let (service, _) = build(config(&server, ProvisionMode::Once), "page", "copy");

        service.search_documents(SearchRequest::new("a")).await.expect("first");
        service.search_documents(SearchRequest::new("b")).await.expect("second");

        embedders.assert_hits_async(1).await;
        search.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn always_mode_provisions_every_request() {
        let server = MockServer::start_async().await;
        let embedders = mock_provisioning(&server).await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/indexes/documents/search");
                then.status(200).json_body(json!({ "hits": [] }));
            })
            .await;
        let (service, _) = build(config(&server, ProvisionMode::Always), "page", "copy");

        service.search_documents(SearchRequest::new("a")).await.expect("first");
        service.search_documents(SearchRequest::new("b")).await.expect("second");

        embedders.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn failed_search_invalidates_provisioning_cache() {
        let server = MockServer::start_async().await;
        let embedders = mock_provisioning(&server).await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/indexes/documents/search");
                then.status(400).body("invalid_search_embedder");
            })
            .await;
        let (service, _) = build(config(&server, ProvisionMode::Once), "page", "copy");

        let error = service
            .search_documents(SearchRequest::new("a"))
            .await
            .expect_err("search rejected");
        assert!(matches!(error, ProcessingError::Search(_)));
        assert!(error.to_string().contains("invalid_search_embedder"));

        let _ = service.search_documents(SearchRequest::new("b")).await;
        embedders.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn clear_then_search_returns_nothing() {
        let server = MockServer::start_async().await;
        mock_provisioning(&server).await;
        let clear = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/indexes/documents/documents");
                then.status(202).json_body(json!({ "taskUid": 7, "status": "enqueued" }));
            })
            .await;
        let task = server
            .mock_async(|when, then| {
                when.method(GET).path("/tasks/7");
                then.status(200).json_body(json!({ "uid": 7, "status": "succeeded" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/indexes/documents/search");
                then.status(200).json_body(json!({ "hits": [] }));
            })
            .await;
        let (service, _) = build(config(&server, ProvisionMode::Always), "page", "copy");

        service.clear_documents().await.expect("cleared");
        let hits = service
            .search_documents(SearchRequest::new("anything"))
            .await
            .expect("search");

        clear.assert_async().await;
        task.assert_async().await;
        assert!(hits.is_empty());
        assert_eq!(service.metrics_snapshot().index_clears, 1);
    }

    #[tokio::test]
    async fn index_reports_document_id() {
        let server = MockServer::start_async().await;
        mock_provisioning(&server).await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/indexes/documents/documents");
                then.status(202).json_body(json!({ "taskUid": 3, "status": "enqueued" }));
            })
            .await;
        let (service, _) = build(config(&server, ProvisionMode::Always), "page", "copy");

        let outcome = service
            .index_document(Document {
                id: 2001,
                title: Some("https://shop.example".into()),
                content: "Summary".into(),
                ad: None,
            })
            .await
            .expect("indexed");

        assert_eq!(outcome, IndexOutcome { id: 2001, task_uid: 3 });
        assert_eq!(service.metrics_snapshot().documents_indexed, 1);
    }

    #[tokio::test]
    async fn clear_waits_for_delete_task_by_default() {
        let server = MockServer::start_async().await;
        mock_provisioning(&server).await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/indexes/documents/documents");
                then.status(202).json_body(json!({ "taskUid": 8, "status": "enqueued" }));
            })
            .await;
        let task = server
            .mock_async(|when, then| {
                when.method(GET).path("/tasks/8");
                then.status(200).json_body(json!({
                    "uid": 8,
                    "status": "failed",
                    "error": { "message": "index locked" }
                }));
            })
            .await;
        let config = config(&server, ProvisionMode::Always);
        assert!(!config.wait_for_tasks);
        let (service, _) = build(config, "page", "copy");

        let error = service.clear_documents().await.expect_err("delete task failed");

        task.assert_async().await;
        assert!(matches!(error, ProcessingError::Clear(MeiliError::TaskFailed { uid: 8, .. })));
        assert_eq!(service.metrics_snapshot().index_clears, 0);
    }
}
