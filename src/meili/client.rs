//! HTTP client wrapper for interacting with Meilisearch.

use crate::config::Config;
use crate::meili::types::{
    DOCUMENT_TEMPLATE, Document, EMBEDDER_NAME, MeiliError, SearchHit, SearchRequest,
    SearchResponse, TaskInfo, TaskStatus, TaskView,
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::{Instant, sleep};

const TASK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lightweight HTTP client for Meilisearch operations against a single index.
pub struct MeiliService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) index_uid: String,
    pub(crate) embedding_model: String,
}

impl MeiliService {
    /// Construct a new client from configuration.
    pub fn new(config: &Config) -> Result<Self, MeiliError> {
        let client = Client::builder()
            .user_agent(concat!("sitebrief/", env!("CARGO_PKG_VERSION")))
            .timeout(config.meili_timeout())
            .build()?;

        let base_url = normalize_base_url(&config.meili_url).map_err(MeiliError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            index = %config.meili_index,
            has_api_key = config
                .meili_api_key
                .as_deref()
                .is_some_and(|value| !value.is_empty()),
            "Initialized Meilisearch HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.meili_api_key.clone(),
            index_uid: config.meili_index.clone(),
            embedding_model: config.embedding_model.clone(),
        })
    }

    /// Uid of the managed index.
    pub fn index_uid(&self) -> &str {
        &self.index_uid
    }

    /// Enable vector search, create the index when missing, and configure the embedder.
    ///
    /// Every step is idempotent, so calling this repeatedly leaves the engine in the same state.
    pub async fn ensure_ready(&self, openai_api_key: &str) -> Result<(), MeiliError> {
        self.enable_vector_store().await;
        self.create_index_if_not_exists().await?;
        self.configure_embedder(openai_api_key).await?;
        tracing::debug!(index = %self.index_uid, "Index and embedder ensured");
        Ok(())
    }

    /// Turn on the `vectorStore` experimental flag.
    ///
    /// Releases where vector search is stable reject the flag, so failures are only logged.
    pub async fn enable_vector_store(&self) {
        if let Err(error) = self.patch_vector_store_flag().await {
            tracing::warn!(error = %error, "Could not enable vectorStore feature; continuing");
        }
    }

    async fn patch_vector_store_flag(&self) -> Result<(), MeiliError> {
        let response = self
            .request(Method::PATCH, "experimental-features")
            .json(&json!({ "vectorStore": true }))
            .send()
            .await?;
        self.ensure_success(response).await
    }

    /// Create the index with `id` as primary key unless it already exists.
    pub async fn create_index_if_not_exists(&self) -> Result<(), MeiliError> {
        if self.index_exists().await? {
            return Ok(());
        }

        tracing::info!(index = %self.index_uid, "Creating index");
        let response = self
            .request(Method::POST, "indexes")
            .json(&json!({ "uid": self.index_uid, "primaryKey": "id" }))
            .send()
            .await?;
        self.ensure_success(response).await
    }

    /// Patch the embedder settings with the canonical OpenAI embedder.
    pub async fn configure_embedder(&self, openai_api_key: &str) -> Result<(), MeiliError> {
        let response = self
            .request(
                Method::PATCH,
                &format!("indexes/{}/settings/embedders", self.index_uid),
            )
            .json(&self.embedder_settings(openai_api_key))
            .send()
            .await?;
        self.ensure_success(response).await?;
        tracing::debug!(
            index = %self.index_uid,
            model = %self.embedding_model,
            "Embedder configured"
        );
        Ok(())
    }

    pub(crate) fn embedder_settings(&self, openai_api_key: &str) -> Value {
        json!({
            EMBEDDER_NAME: {
                "source": "openAi",
                "model": self.embedding_model,
                "apiKey": openai_api_key,
                "documentTemplate": DOCUMENT_TEMPLATE,
            }
        })
    }

    /// Upsert a single document.
    pub async fn add_document(&self, document: &Document) -> Result<TaskInfo, MeiliError> {
        let response = self
            .request(Method::POST, &format!("indexes/{}/documents", self.index_uid))
            .json(&[document])
            .send()
            .await?;
        let task = self.task_from(response).await?;
        tracing::debug!(
            index = %self.index_uid,
            id = document.id,
            task = task.task_uid,
            "Document enqueued"
        );
        Ok(task)
    }

    /// Run a hybrid search, returning hits in the engine's order.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, MeiliError> {
        let body = json!({
            "q": request.query,
            "limit": request.top_k,
            "hybrid": {
                "semanticRatio": request.semantic_ratio,
                "embedder": EMBEDDER_NAME,
            },
            "showRankingScore": true,
        });

        let response = self
            .request(Method::POST, &format!("indexes/{}/search", self.index_uid))
            .json(&body)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = MeiliError::UnexpectedStatus { status, body };
            tracing::error!(index = %self.index_uid, error = %error, "Meilisearch search failed");
            return Err(error);
        }

        let SearchResponse { hits } = response.json().await?;
        Ok(hits)
    }

    /// Delete every document in the index.
    pub async fn clear_documents(&self) -> Result<TaskInfo, MeiliError> {
        let response = self
            .request(Method::DELETE, &format!("indexes/{}/documents", self.index_uid))
            .send()
            .await?;
        let task = self.task_from(response).await?;
        tracing::info!(index = %self.index_uid, task = task.task_uid, "Index clear enqueued");
        Ok(task)
    }

    /// Poll a task until it reaches a terminal state or `timeout` elapses.
    pub async fn wait_for_task(&self, task_uid: u64, timeout: Duration) -> Result<(), MeiliError> {
        let deadline = Instant::now() + timeout;
        loop {
            let response = self
                .request(Method::GET, &format!("tasks/{task_uid}"))
                .send()
                .await?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(MeiliError::UnexpectedStatus { status, body });
            }

            let task: TaskView = response.json().await?;
            match task.status {
                TaskStatus::Succeeded => return Ok(()),
                status if status.is_terminal() => {
                    let message = task.error.map(|error| error.message).unwrap_or_default();
                    tracing::error!(task = task.uid, ?status, %message, "Meilisearch task did not succeed");
                    return Err(MeiliError::TaskFailed {
                        uid: task.uid,
                        status,
                        message,
                    });
                }
                _ => {}
            }

            if Instant::now() >= deadline {
                return Err(MeiliError::TaskTimeout(task_uid));
            }
            sleep(TASK_POLL_INTERVAL).await;
        }
    }

    /// Check that the engine answers `GET /health`.
    pub async fn health(&self) -> Result<(), MeiliError> {
        let response = self.request(Method::GET, "health").send().await?;
        self.ensure_success(response).await
    }

    async fn index_exists(&self) -> Result<bool, MeiliError> {
        let response = self
            .request(Method::GET, &format!("indexes/{}", self.index_uid))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = MeiliError::UnexpectedStatus { status, body };
                tracing::error!(index = %self.index_uid, error = %error, "Index existence check failed");
                Err(error)
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.bearer_auth(api_key);
        }
        req
    }

    async fn ensure_success(&self, response: reqwest::Response) -> Result<(), MeiliError> {
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = MeiliError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Meilisearch request failed");
            Err(error)
        }
    }

    async fn task_from(&self, response: reqwest::Response) -> Result<TaskInfo, MeiliError> {
        match response.status() {
            StatusCode::OK | StatusCode::ACCEPTED => Ok(response.json().await?),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = MeiliError::UnexpectedStatus { status, body };
                tracing::error!(index = %self.index_uid, error = %error, "Meilisearch write rejected");
                Err(error)
            }
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
