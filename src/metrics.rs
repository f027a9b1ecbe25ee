use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing request outcomes since startup.
#[derive(Default)]
pub struct ServiceMetrics {
    pages_summarized: AtomicU64,
    documents_indexed: AtomicU64,
    searches_served: AtomicU64,
    index_clears: AtomicU64,
    failures: AtomicU64,
}

impl ServiceMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a page that was crawled and summarized.
    pub fn record_summary(&self) {
        self.pages_summarized.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a document accepted by the search engine.
    pub fn record_index(&self) {
        self.documents_indexed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed search.
    pub fn record_search(&self) {
        self.searches_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a full index wipe.
    pub fn record_clear(&self) {
        self.index_clears.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that ended in an error.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pages_summarized: self.pages_summarized.load(Ordering::Relaxed),
            documents_indexed: self.documents_indexed.load(Ordering::Relaxed),
            searches_served: self.searches_served.load(Ordering::Relaxed),
            index_clears: self.index_clears.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of request counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Pages crawled and summarized successfully.
    pub pages_summarized: u64,
    /// Documents accepted for indexing.
    pub documents_indexed: u64,
    /// Searches answered.
    pub searches_served: u64,
    /// Index wipes performed.
    pub index_clears: u64,
    /// Requests that failed at any stage.
    pub failures: u64,
}
