//! Watermark module for the indexer pipeline.
//!
//! Resets the watermark column of indexed rows to the sentinel so the next
//! incremental run no longer selects them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, instrument, warn};

use crate::errors::PipelineError;
use es_indexer_repository::{SourceDatabase, Statement};
use es_indexer_shared::{FieldValue, UpdateKey, UpdateStrategy, WatermarkColumn, WATERMARK_SENTINEL};

/// Result of a watermark reset.
#[derive(Debug, Clone, Copy, Default)]
pub struct WatermarkOutcome {
    /// Rows the database reported as changed.
    pub rows_reset: u64,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Resets watermarks inside one transaction, retrying on lock contention.
pub struct WatermarkUpdater {
    database: Arc<dyn SourceDatabase>,
    column: WatermarkColumn,
    strategy: UpdateStrategy,
    retry: u32,
    retry_wait: Duration,
}

impl WatermarkUpdater {
    /// Create an updater for the `schema.table.field` watermark column.
    ///
    /// `retry` is the number of additional attempts after a lock wait
    /// timeout or deadlock.
    pub fn new(
        database: Arc<dyn SourceDatabase>,
        column: &str,
        strategy: UpdateStrategy,
        retry: u32,
        retry_wait: Duration,
    ) -> Result<Self, PipelineError> {
        let column = WatermarkColumn::parse(column).ok_or_else(|| {
            PipelineError::config(format!(
                "sql.last-modified-timestamp-field must be schema.table.field, got {}",
                column
            ))
        })?;

        Ok(Self {
            database,
            column,
            strategy,
            retry,
            retry_wait,
        })
    }

    /// Build the UPDATE statements for `keys`.
    pub fn statements(&self, keys: &[UpdateKey]) -> Vec<Statement> {
        let prefix = format!(
            "UPDATE {} SET {} = '{}' WHERE",
            self.column.qualified_table(),
            self.column.field,
            WATERMARK_SENTINEL
        );

        match self.strategy {
            UpdateStrategy::PerRow => keys
                .iter()
                .map(|key| {
                    Statement::new(
                        format!("{} {} = ?", prefix, key.predicate),
                        vec![key.value.clone()],
                    )
                })
                .collect(),
            UpdateStrategy::Consolidated => {
                let mut groups: Vec<(&str, Vec<FieldValue>)> = Vec::new();
                for key in keys {
                    match groups.iter_mut().find(|(predicate, _)| *predicate == key.predicate) {
                        Some((_, values)) => values.push(key.value.clone()),
                        None => groups.push((key.predicate.as_str(), vec![key.value.clone()])),
                    }
                }

                groups
                    .into_iter()
                    .map(|(predicate, values)| {
                        let markers = vec!["?"; values.len()].join(", ");
                        Statement::new(format!("{} {} IN ({})", prefix, predicate, markers), values)
                    })
                    .collect()
            }
        }
    }

    /// Reset the watermark of every row identified by `keys`.
    ///
    /// All statements run in one transaction. Lock contention retries the
    /// whole transaction; any other failure is returned immediately.
    #[instrument(skip(self, keys), fields(column = %self.column, keys = keys.len()))]
    pub async fn update(&self, keys: &[UpdateKey]) -> Result<WatermarkOutcome, PipelineError> {
        if keys.is_empty() {
            return Ok(WatermarkOutcome::default());
        }

        let start = Instant::now();
        let statements = self.statements(keys);
        let max_attempts = self.retry.saturating_add(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.database.execute_transaction(&statements).await {
                Ok(rows_reset) => {
                    let elapsed = start.elapsed();
                    info!(
                        rows_reset = rows_reset,
                        statements = statements.len(),
                        attempts = attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Watermarks reset"
                    );
                    return Ok(WatermarkOutcome {
                        rows_reset,
                        attempts: attempt,
                        elapsed,
                    });
                }
                Err(e) if e.is_lock_contention() && attempt < max_attempts => {
                    warn!(
                        attempt = attempt,
                        max_attempts = max_attempts,
                        wait_secs = self.retry_wait.as_secs(),
                        error = %e,
                        "Lock contention while resetting watermarks, retrying"
                    );
                    tokio::time::sleep(self.retry_wait).await;
                }
                Err(e) => {
                    error!(attempts = attempt, error = %e, "Watermark reset failed");
                    return Err(e.into());
                }
            }
        }
    }
}
