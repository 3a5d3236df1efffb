//! Fetcher module for the indexer pipeline.
//!
//! Reads the rows of a run from the source database.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use crate::errors::PipelineError;
use es_indexer_repository::SourceDatabase;
use es_indexer_shared::SourceRow;

/// Rows returned by a fetch, with the time it took.
#[derive(Debug, Clone)]
pub struct FetchedRows {
    pub rows: Vec<SourceRow>,
    pub elapsed: Duration,
}

/// Runs the optional pre-query and the SELECT of a run.
pub struct RowFetcher {
    database: Arc<dyn SourceDatabase>,
    pre_query: Option<String>,
}

impl RowFetcher {
    /// Create a fetcher without a pre-query.
    pub fn new(database: Arc<dyn SourceDatabase>) -> Self {
        Self {
            database,
            pre_query: None,
        }
    }

    /// Run `pre_query` before every SELECT, e.g. to set session variables.
    ///
    /// The pre-query runs in strict mode: any warning it raises fails the
    /// fetch.
    pub fn with_pre_query(mut self, pre_query: Option<String>) -> Self {
        self.pre_query = pre_query.filter(|q| !q.trim().is_empty());
        self
    }

    /// Fetch the rows selected by `query`.
    #[instrument(skip(self, query))]
    pub async fn fetch(&self, query: &str) -> Result<FetchedRows, PipelineError> {
        let start = Instant::now();

        if let Some(pre_query) = &self.pre_query {
            debug!(query = %pre_query, "Running pre-query");
            self.database.execute_strict(pre_query).await?;
        }

        debug!(query = %query, "Running select");
        let rows = self.database.fetch_rows(query).await?;
        let elapsed = start.elapsed();

        info!(
            rows = rows.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Fetched rows"
        );

        Ok(FetchedRows { rows, elapsed })
    }
}
