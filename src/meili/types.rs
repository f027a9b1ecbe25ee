//! Shared types for the Meilisearch integration.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Name of the embedder configured on the index and referenced by hybrid search.
pub const EMBEDDER_NAME: &str = "default";

/// Template used by the embedder to turn a document into embedding input.
pub const DOCUMENT_TEMPLATE: &str = "{{doc.content}}";

/// Errors returned while interacting with Meilisearch.
#[derive(Debug, Error)]
pub enum MeiliError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Meilisearch URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Meilisearch responded with an unexpected status code.
    #[error("Meilisearch error ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Meilisearch.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// An asynchronous task finished without succeeding.
    #[error("Meilisearch task {uid} {status:?}: {message}")]
    TaskFailed {
        /// Task identifier.
        uid: u64,
        /// Terminal status reported for the task.
        status: TaskStatus,
        /// Error message attached to the task, if any.
        message: String,
    },
    /// Task did not reach a terminal state in time.
    #[error("Timed out waiting for Meilisearch task {0}")]
    TaskTimeout(u64),
}

/// Document stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Caller-assigned unique identifier and index primary key.
    pub id: i64,
    /// Optional title, usually the source URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Text embedded and searched.
    pub content: String,
    /// Optional advertisement copy stored alongside the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad: Option<String>,
}

/// Search parameters rejected before any upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SearchRequestError {
    /// `semantic_ratio` was NaN or outside `[0, 1]`.
    #[error("semantic_ratio must be between 0 and 1, got {0}")]
    SemanticRatioOutOfRange(f32),
}

fn default_top_k() -> usize {
    5
}

fn default_semantic_ratio() -> f32 {
    1.0
}

/// Hybrid search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Query text.
    pub query: String,
    /// Maximum number of hits.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Weight of vector similarity against keyword relevance, within `[0, 1]`.
    #[serde(default = "default_semantic_ratio")]
    pub semantic_ratio: f32,
}

impl SearchRequest {
    /// Build a request with the default `top_k` and `semantic_ratio`.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: default_top_k(),
            semantic_ratio: default_semantic_ratio(),
        }
    }

    /// Reject ratios outside `[0, 1]` (including NaN).
    pub fn validate(&self) -> Result<(), SearchRequestError> {
        if (0.0..=1.0).contains(&self.semantic_ratio) {
            Ok(())
        } else {
            Err(SearchRequestError::SemanticRatioOutOfRange(
                self.semantic_ratio,
            ))
        }
    }
}

/// Search hit as returned by Meilisearch.
///
/// Known fields are typed; everything else the engine attaches (ranking details, formatted
/// fields) is kept in `extra` and serialized back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document identifier.
    pub id: Value,
    /// Stored title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Stored content.
    #[serde(default)]
    pub content: String,
    /// Vector similarity score when the hit came from the semantic side.
    #[serde(
        rename = "_semanticScore",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub semantic_score: Option<f64>,
    /// Remaining hit fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

/// Summary of an enqueued asynchronous task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    /// Task identifier used with `GET /tasks/{uid}`.
    pub task_uid: u64,
    /// Index the task applies to.
    #[serde(default)]
    pub index_uid: Option<String>,
    /// Status at enqueue time.
    pub status: TaskStatus,
}

/// Lifecycle state of a Meilisearch task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    /// Waiting in the queue.
    Enqueued,
    /// Currently running.
    Processing,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Cancelled before completion.
    Canceled,
}

impl TaskStatus {
    /// Whether the task will not change state again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TaskView {
    pub uid: u64,
    pub status: TaskStatus,
    #[serde(default)]
    pub error: Option<TaskErrorView>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TaskErrorView {
    #[serde(default)]
    pub message: String,
}
