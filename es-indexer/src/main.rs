//! ES Indexer
//!
//! Entry point for one indexing pass: load configuration, run the pipeline
//! once and report the outcome.

use std::process::ExitCode;

use tracing::{error, info};

use es_indexer::logging::init_tracing;
use es_indexer::{Dependencies, IndexingError, InvocationSettings};
use es_indexer_shared::RunReport;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let settings = match InvocationSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            init_tracing(false);
            error!(error = %e, "Invalid invocation");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(settings.debug);

    match run(&settings).await {
        Ok(report) => {
            log_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(index = %settings.index_name, error = %e, "Indexing run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: &InvocationSettings) -> Result<RunReport, IndexingError> {
    let mut dependencies = Dependencies::new(settings)?;
    let result = dependencies.orchestrator.run().await;
    dependencies.database.disconnect().await;
    Ok(result?)
}

fn log_report(report: &RunReport) {
    info!(
        index = %report.index_name,
        finished_at = %chrono::Utc::now().to_rfc3339(),
        rows_fetched = report.rows_fetched,
        documents_batched = report.documents_batched,
        rows_deferred = report.rows_deferred,
        payload_bytes = report.payload_bytes,
        document_failures = report.document_failures.len(),
        watermarks_reset = report.watermarks_reset,
        fetch_ms = report.timings.fetch.as_millis() as u64,
        map_ms = report.timings.map.as_millis() as u64,
        submit_ms = report.timings.submit.as_millis() as u64,
        update_ms = report.timings.update.as_millis() as u64,
        dry_run = report.dry_run,
        "Indexing run finished"
    );

    if let Some(query) = &report.query {
        info!(query = %query, "Debug: executed query");
    }
    if let Some(payload) = &report.payload {
        info!(bytes = payload.len(), payload = %payload, "Debug: bulk payload");
    }
}
