#![deny(missing_docs)]

//! Core library for the sitebrief crawl → summarize → hybrid search service.

/// HTTP routing and REST handlers.
pub mod api;
/// Chat-completion client used for summaries.
pub mod completion;
/// Environment-driven configuration management.
pub mod config;
/// Page fetching and text extraction.
pub mod crawl;
/// Structured logging and tracing setup.
pub mod logging;
/// Meilisearch index, embedder, and search integration.
pub mod meili;
/// Request counters.
pub mod metrics;
/// Orchestration of crawl, summary, index, and search requests.
pub mod processing;
/// Language routing, prompts, and validation for marketing summaries.
pub mod summary;
