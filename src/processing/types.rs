//! Core data types and error definitions for the orchestration pipeline.

use crate::{
    config::ConfigError, crawl::CrawlError, meili::MeiliError, summary::SummaryError,
};
use serde::Serialize;
use thiserror::Error;

/// Errors emitted by the orchestration pipeline.
///
/// Each variant maps to one failing stage; the display text carries the upstream message so it
/// can be returned to callers verbatim.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Page could not be fetched or produced no content.
    #[error("Crawl failed: {0}")]
    Crawl(#[from] CrawlError),
    /// Model call failed or returned an unusable summary.
    #[error("{0}")]
    Summary(#[from] SummaryError),
    /// Provisioning or document upsert failed.
    #[error("Indexing failed: {0}")]
    Index(MeiliError),
    /// Provisioning or search request failed.
    #[error("Search failed: {0}")]
    Search(MeiliError),
    /// Provisioning or document deletion failed.
    #[error("Clearing index failed: {0}")]
    Clear(MeiliError),
    /// Required configuration was missing for this request.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
    /// A backing client could not be constructed.
    #[error("Service setup failed: {0}")]
    Setup(String),
}

/// Page text and its marketing summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlResult {
    /// URL that was crawled.
    pub url: String,
    /// Extracted page text.
    pub markdown: String,
    /// Validated marketing summary.
    pub summary: String,
}

/// Outcome of a successful index request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOutcome {
    /// Identifier of the indexed document.
    pub id: i64,
    /// Meilisearch task that applies the write.
    pub task_uid: u64,
}

/// Reachability snapshot for Meilisearch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSnapshot {
    /// Whether `GET /health` answered successfully.
    pub reachable: bool,
    /// Diagnostic captured when the engine is unreachable.
    pub error: Option<String>,
}
