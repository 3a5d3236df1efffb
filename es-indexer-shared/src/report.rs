//! Result record of a single indexing run.

use std::time::Duration;

use serde::Serialize;

/// A document the search engine rejected inside an otherwise successful
/// bulk response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentFailure {
    /// Position of the document within the batch.
    pub position: usize,
    /// Document id as reported by the search engine.
    pub id: Option<String>,
    /// Per-item HTTP status.
    pub status: u16,
    /// Error detail as reported by the search engine.
    pub error: String,
}

/// Elapsed wall time per stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageTimings {
    pub fetch: Duration,
    pub map: Duration,
    pub submit: Duration,
    pub update: Duration,
}

impl StageTimings {
    pub fn total(&self) -> Duration {
        self.fetch + self.map + self.submit + self.update
    }
}

/// Measurements and outcome of one run, returned to the caller.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub index_name: String,
    pub rows_fetched: usize,
    pub documents_batched: usize,
    /// Rows left out of the batch by the payload size ceiling.
    pub rows_deferred: usize,
    pub payload_bytes: usize,
    pub submitted: bool,
    pub dry_run: bool,
    pub watermarks_reset: usize,
    pub document_failures: Vec<DocumentFailure>,
    pub timings: StageTimings,
    /// The SELECT that was executed, when debug capture is enabled.
    pub query: Option<String>,
    /// The NDJSON payload, when debug capture is enabled.
    pub payload: Option<String>,
}

impl RunReport {
    pub fn new(index_name: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            ..Default::default()
        }
    }

    /// Whether the run did nothing because no rows were eligible.
    pub fn is_empty(&self) -> bool {
        self.documents_batched == 0
    }
}
