//! Request orchestration: crawl, summarize, index, and search.

mod service;
pub mod types;

pub use service::{ProcessingApi, ProcessingService};
pub use types::{CrawlResult, HealthSnapshot, IndexOutcome, ProcessingError};
