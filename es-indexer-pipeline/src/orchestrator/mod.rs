//! Orchestrator module for the indexer pipeline.
//!
//! Coordinates the fetcher, mapper, loader and watermark components for a
//! single run.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::errors::PipelineError;
use crate::fetcher::RowFetcher;
use crate::loader::BulkSubmitter;
use crate::mapper::DocumentMapper;
use crate::query::QueryBuilder;
use crate::watermark::WatermarkUpdater;
use es_indexer_repository::{SearchIndexProvider, SourceDatabase};
use es_indexer_shared::{IndexerConfig, RunReport, UpdateKey};

/// Largest number of rows fetched per run.
pub const MAX_BATCH_LIMIT: usize = 5000;

/// Rows fetched per run when no limit is given.
pub const DEFAULT_BATCH_LIMIT: usize = 1000;

/// Invocation parameters of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub index_name: String,
    /// Rows fetched per run, always within `1..=MAX_BATCH_LIMIT`.
    pub batch_limit: usize,
    /// Full reindex starting at this offset instead of an incremental run.
    pub offset: Option<u64>,
    /// Map rows but neither submit nor reset watermarks.
    pub dry_run: bool,
    pub update_watermark: bool,
    /// Keep the watermark of documents the search engine rejected.
    pub exclude_failed_documents: bool,
    /// Capture the query and the payload in the report.
    pub debug: bool,
}

impl RunOptions {
    pub fn new(index_name: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            batch_limit: DEFAULT_BATCH_LIMIT,
            offset: None,
            dry_run: false,
            update_watermark: true,
            exclude_failed_documents: false,
            debug: false,
        }
    }

    /// Set the batch limit, clamped to `1..=MAX_BATCH_LIMIT`.
    pub fn with_batch_limit(mut self, batch_limit: usize) -> Self {
        self.batch_limit = batch_limit.clamp(1, MAX_BATCH_LIMIT);
        self
    }

    pub fn with_offset(mut self, offset: Option<u64>) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_update_watermark(mut self, update_watermark: bool) -> Self {
        self.update_watermark = update_watermark;
        self
    }

    pub fn with_exclude_failed_documents(mut self, exclude: bool) -> Self {
        self.exclude_failed_documents = exclude;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Stage the orchestrator is in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    Fetching,
    Mapping,
    Submitting,
    UpdatingWatermark,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Mapping => "mapping",
            Self::Submitting => "submitting",
            Self::UpdatingWatermark => "updating-watermark",
        };
        f.write_str(name)
    }
}

/// Orchestrator that coordinates the pipeline components.
///
/// A run is Fetch, Map, then Submit and Update when the batch is not empty.
/// Any error aborts the run; the next run starts from the database state.
pub struct Orchestrator {
    options: RunOptions,
    query: QueryBuilder,
    fetcher: RowFetcher,
    mapper: DocumentMapper,
    submitter: BulkSubmitter,
    watermark: WatermarkUpdater,
    state: RunState,
}

impl Orchestrator {
    /// Validate the configuration and wire the components.
    ///
    /// Fails with `ConfigError` or `MappingError` before any I/O happens.
    pub fn new(
        config: &IndexerConfig,
        options: RunOptions,
        database: Arc<dyn SourceDatabase>,
        search: Arc<dyn SearchIndexProvider>,
    ) -> Result<Self, PipelineError> {
        let query = QueryBuilder::from_config(&config.sql)?;
        let mapper = DocumentMapper::new(options.index_name.clone(), config)?;

        let watermark_column = config
            .sql
            .last_modified_timestamp_field
            .as_deref()
            .unwrap_or_default();
        let watermark = WatermarkUpdater::new(
            database.clone(),
            watermark_column,
            config.sql.update_strategy,
            config.rds.retry,
            Duration::from_secs(config.rds.retry_wait_sec),
        )?;

        let fetcher = RowFetcher::new(database).with_pre_query(config.sql.query_pre.clone());
        let submitter = BulkSubmitter::new(search, &config.es, config.settings);

        Ok(Self {
            options,
            query,
            fetcher,
            mapper,
            submitter,
            watermark,
            state: RunState::Idle,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run one Fetch, Map, Submit, Update cycle.
    #[instrument(skip(self), fields(index = %self.options.index_name))]
    pub async fn run(&mut self) -> Result<RunReport, PipelineError> {
        let result = self.run_stages().await;
        self.enter(RunState::Idle);
        result
    }

    fn enter(&mut self, state: RunState) {
        debug!(from = %self.state, to = %state, "State transition");
        self.state = state;
    }

    async fn run_stages(&mut self) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::new(self.options.index_name.clone());
        report.dry_run = self.options.dry_run;

        self.enter(RunState::Fetching);
        let query = self.query.build(self.options.batch_limit, self.options.offset);
        let fetched = self.fetcher.fetch(&query).await?;
        report.rows_fetched = fetched.rows.len();
        report.timings.fetch = fetched.elapsed;
        if self.options.debug {
            report.query = Some(query);
        }

        self.enter(RunState::Mapping);
        let mapped = self.mapper.map_rows(&fetched.rows)?;
        report.documents_batched = mapped.batch.len();
        report.rows_deferred = mapped.rows_deferred;
        report.payload_bytes = mapped.batch.byte_len();
        report.timings.map = mapped.elapsed;
        if self.options.debug {
            report.payload = Some(mapped.batch.to_string());
        }

        if mapped.batch.is_empty() || mapped.update_keys.is_empty() {
            info!("No rows to index");
            return Ok(report);
        }

        if self.options.dry_run {
            info!(documents = report.documents_batched, "Dry run, nothing submitted");
            return Ok(report);
        }

        self.enter(RunState::Submitting);
        let outcome = self
            .submitter
            .submit(&self.options.index_name, &mapped.batch)
            .await?;
        report.submitted = true;
        report.timings.submit = outcome.elapsed;
        report.document_failures = outcome.failures;

        if !self.options.update_watermark {
            info!("Watermark update disabled");
            return Ok(report);
        }

        self.enter(RunState::UpdatingWatermark);
        let keys: Vec<UpdateKey> = if self.options.exclude_failed_documents {
            mapped
                .update_keys
                .into_iter()
                .enumerate()
                .filter(|(position, _)| {
                    !report
                        .document_failures
                        .iter()
                        .any(|failure| failure.position == *position)
                })
                .map(|(_, key)| key)
                .collect()
        } else {
            mapped.update_keys
        };

        let outcome = self.watermark.update(&keys).await?;
        report.watermarks_reset = outcome.rows_reset as usize;
        report.timings.update = outcome.elapsed;

        info!(
            fetched = report.rows_fetched,
            batched = report.documents_batched,
            deferred = report.rows_deferred,
            failed = report.document_failures.len(),
            reset = report.watermarks_reset,
            elapsed_ms = report.timings.total().as_millis() as u64,
            "Run complete"
        );

        Ok(report)
    }
}
