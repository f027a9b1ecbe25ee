//! Meilisearch index, embedder, and hybrid search integration.

pub mod client;
pub mod provision;
pub mod types;

pub use client::MeiliService;
pub use provision::Provisioner;
pub use types::{
    Document, EMBEDDER_NAME, MeiliError, SearchHit, SearchRequest, SearchRequestError, TaskInfo,
    TaskStatus,
};
