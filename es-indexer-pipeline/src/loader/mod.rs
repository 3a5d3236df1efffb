//! Loader module for the indexer pipeline.
//!
//! Submits a bulk batch to the search engine, creating the index first when
//! shard or replica settings are configured.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, warn};

use crate::errors::PipelineError;
use crate::mapper::BulkBatch;
use es_indexer_repository::SearchIndexProvider;
use es_indexer_shared::{DocumentFailure, EsConfig, IndexSettings};

/// Bytes of the payload quoted in error messages.
const PAYLOAD_PREVIEW_BYTES: usize = 512;

/// Result of a successful bulk submission.
#[derive(Debug, Clone, Default)]
pub struct SubmitOutcome {
    /// Documents the search engine rejected individually.
    pub failures: Vec<DocumentFailure>,
    /// Bulk requests sent, retries included.
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Sends bulk batches, retrying on read timeouts.
pub struct BulkSubmitter {
    client: Arc<dyn SearchIndexProvider>,
    settings: Option<IndexSettings>,
    attempts: u32,
    retry_wait: Duration,
    timeout_secs: u64,
}

impl BulkSubmitter {
    /// Create a submitter from the `es` and `settings` configuration sections.
    ///
    /// `es.retry` is the total number of bulk attempts; values below one are
    /// treated as one.
    pub fn new(
        client: Arc<dyn SearchIndexProvider>,
        config: &EsConfig,
        settings: Option<IndexSettings>,
    ) -> Self {
        Self {
            client,
            settings: settings.filter(IndexSettings::is_configured),
            attempts: config.retry.max(1),
            retry_wait: Duration::from_secs(config.retry_wait_sec),
            timeout_secs: config.timeout,
        }
    }

    /// Create the index with the configured settings if it does not exist.
    ///
    /// Does nothing when neither shards nor replicas are configured.
    #[instrument(skip(self))]
    pub async fn ensure_index(&self, index: &str) -> Result<(), PipelineError> {
        let Some(settings) = &self.settings else {
            return Ok(());
        };

        if self.client.index_exists(index).await? {
            debug!(index = %index, "Index exists");
            return Ok(());
        }

        info!(
            index = %index,
            shards = ?settings.shards,
            replicas = ?settings.replicas,
            "Creating index"
        );
        self.client.create_index(index, settings).await?;
        Ok(())
    }

    /// Ensure the index, then send `batch` to `/_bulk`.
    ///
    /// # Errors
    ///
    /// * `TimeoutError` - every attempt timed out
    /// * `ConnectError` - the search engine could not be reached (not retried)
    /// * `HttpError` - the bulk request was answered with a non-200 status
    /// * `SearchError` - the response could not be interpreted
    #[instrument(skip(self, batch), fields(documents = batch.len(), bytes = batch.byte_len()))]
    pub async fn submit(&self, index: &str, batch: &BulkBatch) -> Result<SubmitOutcome, PipelineError> {
        let start = Instant::now();
        self.ensure_index(index).await?;

        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            match self.client.bulk(batch.as_bytes()).await {
                Ok(response) => break response,
                Err(e) if e.is_timeout() && attempt < self.attempts => {
                    warn!(
                        attempt = attempt,
                        max_attempts = self.attempts,
                        wait_secs = self.retry_wait.as_secs(),
                        "Bulk request timed out, retrying"
                    );
                    tokio::time::sleep(self.retry_wait).await;
                }
                Err(e) if e.is_timeout() => {
                    error!(attempts = attempt, "Bulk request timed out on every attempt");
                    return Err(PipelineError::TimeoutError(format!(
                        "bulk request timed out after {} attempt(s), current timeout {}s, \
                         you can increase it via key timeout in the es section: {}",
                        attempt, self.timeout_secs, e
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        };

        if !response.is_success() {
            error!(status = response.status, "Bulk request rejected");
            return Err(PipelineError::http(
                response.status,
                format!(
                    "bulk request failed: {} | payload: {}",
                    response.body,
                    preview(batch.as_bytes())
                ),
            ));
        }

        let failures = response.document_failures()?;
        for failure in &failures {
            error!(
                position = failure.position,
                id = ?failure.id,
                status = failure.status,
                error = %failure.error,
                "Document rejected"
            );
        }

        let elapsed = start.elapsed();
        info!(
            documents = batch.len(),
            failed = failures.len(),
            attempts = attempt,
            elapsed_ms = elapsed.as_millis() as u64,
            "Bulk request accepted"
        );

        Ok(SubmitOutcome {
            failures,
            attempts: attempt,
            elapsed,
        })
    }
}

fn preview(payload: &[u8]) -> String {
    let end = payload.len().min(PAYLOAD_PREVIEW_BYTES);
    let mut text = String::from_utf8_lossy(&payload[..end]).into_owned();
    if payload.len() > end {
        text.push_str("...");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use es_indexer_repository::{BulkResponse, SearchIndexError};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock provider replaying scripted bulk results.
    struct MockSearchIndex {
        exists: Result<bool, SearchIndexError>,
        create_error: Option<SearchIndexError>,
        bulk_results: Mutex<VecDeque<Result<BulkResponse, SearchIndexError>>>,
        bulk_calls: AtomicUsize,
        created: AtomicUsize,
    }

    impl MockSearchIndex {
        fn new(exists: bool, results: Vec<Result<BulkResponse, SearchIndexError>>) -> Self {
            Self {
                exists: Ok(exists),
                create_error: None,
                bulk_results: Mutex::new(results.into()),
                bulk_calls: AtomicUsize::new(0),
                created: AtomicUsize::new(0),
            }
        }

        fn with_exists_error(mut self, err: SearchIndexError) -> Self {
            self.exists = Err(err);
            self
        }

        fn with_create_error(mut self, err: SearchIndexError) -> Self {
            self.create_error = Some(err);
            self
        }
    }

    #[async_trait]
    impl SearchIndexProvider for MockSearchIndex {
        async fn index_exists(&self, _index: &str) -> Result<bool, SearchIndexError> {
            self.exists.clone()
        }

        async fn create_index(
            &self,
            _index: &str,
            _settings: &IndexSettings,
        ) -> Result<(), SearchIndexError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            match &self.create_error {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }

        async fn bulk(&self, _payload: &[u8]) -> Result<BulkResponse, SearchIndexError> {
            self.bulk_calls.fetch_add(1, Ordering::SeqCst);
            self.bulk_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(BulkResponse::new(200, r#"{"errors":false,"items":[]}"#)))
        }
    }

    fn es_config(retry: u32, retry_wait_sec: u64) -> EsConfig {
        EsConfig {
            endpoint: "http://localhost:9200".to_string(),
            timeout: 3,
            retry,
            retry_wait_sec,
            user: None,
            password: None,
            verify_certificates: true,
        }
    }

    fn batch() -> BulkBatch {
        let mut batch = BulkBatch::new();
        batch
            .try_push(&json!({"index": {"_id": "1"}}), &json!({"name": "a"}))
            .unwrap();
        batch
    }

    fn ok() -> Result<BulkResponse, SearchIndexError> {
        Ok(BulkResponse::new(200, r#"{"errors":false,"items":[{"index":{"_id":"1","status":201}}]}"#))
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout_is_retried_with_fixed_wait() {
        let client = Arc::new(MockSearchIndex::new(
            true,
            vec![
                Err(SearchIndexError::timeout("read timed out")),
                Err(SearchIndexError::timeout("read timed out")),
                ok(),
            ],
        ));
        let submitter = BulkSubmitter::new(client.clone(), &es_config(3, 5), None);

        let started = tokio::time::Instant::now();
        let outcome = submitter.submit("products", &batch()).await.unwrap();

        assert_eq!(outcome.attempts, 3);
        assert_eq!(client.bulk_calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_exhaust_exactly_retry_attempts() {
        let client = Arc::new(MockSearchIndex::new(
            true,
            (0..5)
                .map(|_| Err(SearchIndexError::timeout("read timed out")))
                .collect(),
        ));
        let submitter = BulkSubmitter::new(client.clone(), &es_config(2, 1), None);

        let result = submitter.submit("products", &batch()).await;

        assert!(matches!(result, Err(PipelineError::TimeoutError(_))));
        assert_eq!(client.bulk_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_failure_is_not_retried() {
        let client = Arc::new(MockSearchIndex::new(
            true,
            vec![Err(SearchIndexError::connection("connection refused"))],
        ));
        let submitter = BulkSubmitter::new(client.clone(), &es_config(3, 1), None);

        let started = tokio::time::Instant::now();
        let result = submitter.submit("products", &batch()).await;

        assert!(matches!(result, Err(PipelineError::ConnectError(_))));
        assert_eq!(client.bulk_calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_non_200_is_fatal_with_payload_preview() {
        let client = Arc::new(MockSearchIndex::new(
            true,
            vec![Ok(BulkResponse::new(413, "request entity too large"))],
        ));
        let submitter = BulkSubmitter::new(client, &es_config(1, 1), None);

        match submitter.submit("products", &batch()).await {
            Err(PipelineError::HttpError { status, context }) => {
                assert_eq!(status, 413);
                assert!(context.contains("request entity too large"));
                assert!(context.contains(r#"{"name":"a"}"#));
            }
            other => panic!("expected http error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_document_failures_are_reported() {
        let body = json!({
            "errors": true,
            "items": [
                {"index": {"_id": "1", "status": 400,
                           "error": {"type": "mapper_parsing_exception", "reason": "bad date"}}}
            ]
        });
        let client = Arc::new(MockSearchIndex::new(
            true,
            vec![Ok(BulkResponse::new(200, body.to_string()))],
        ));
        let submitter = BulkSubmitter::new(client, &es_config(1, 1), None);

        let outcome = submitter.submit("products", &batch()).await.unwrap();

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].status, 400);
        assert_eq!(outcome.failures[0].id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_missing_errors_key_is_fatal() {
        let client = Arc::new(MockSearchIndex::new(
            true,
            vec![Ok(BulkResponse::new(200, r#"{"took":3}"#))],
        ));
        let submitter = BulkSubmitter::new(client, &es_config(1, 1), None);

        assert!(matches!(
            submitter.submit("products", &batch()).await,
            Err(PipelineError::SearchError(_))
        ));
    }

    #[tokio::test]
    async fn test_index_created_only_when_settings_configured() {
        let settings = IndexSettings {
            shards: Some(3),
            replicas: Some(1),
        };

        let client = Arc::new(MockSearchIndex::new(false, vec![ok()]));
        let submitter = BulkSubmitter::new(client.clone(), &es_config(1, 1), Some(settings));
        submitter.submit("products", &batch()).await.unwrap();
        assert_eq!(client.created.load(Ordering::SeqCst), 1);

        let client = Arc::new(MockSearchIndex::new(false, vec![ok()]));
        let submitter = BulkSubmitter::new(client.clone(), &es_config(1, 1), None);
        submitter.submit("products", &batch()).await.unwrap();
        assert_eq!(client.created.load(Ordering::SeqCst), 0);

        let client = Arc::new(MockSearchIndex::new(true, vec![ok()]));
        let submitter = BulkSubmitter::new(client.clone(), &es_config(1, 1), Some(settings));
        submitter.submit("products", &batch()).await.unwrap();
        assert_eq!(client.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_existence_check_stops_before_bulk() {
        let client = Arc::new(
            MockSearchIndex::new(false, vec![ok()])
                .with_exists_error(SearchIndexError::http(403, "forbidden")),
        );
        let submitter = BulkSubmitter::new(
            client.clone(),
            &es_config(1, 1),
            Some(IndexSettings {
                shards: Some(2),
                replicas: None,
            }),
        );

        let result = submitter.submit("products", &batch()).await;

        assert!(matches!(result, Err(PipelineError::HttpError { status: 403, .. })));
        assert_eq!(client.created.load(Ordering::SeqCst), 0);
        assert_eq!(client.bulk_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_index_creation_stops_before_bulk() {
        let client = Arc::new(
            MockSearchIndex::new(false, vec![ok()]).with_create_error(
                SearchIndexError::index_creation("creating index products failed with status 400"),
            ),
        );
        let submitter = BulkSubmitter::new(
            client.clone(),
            &es_config(1, 1),
            Some(IndexSettings {
                shards: Some(2),
                replicas: Some(0),
            }),
        );

        let result = submitter.submit("products", &batch()).await;

        assert!(matches!(result, Err(PipelineError::SearchError(_))));
        assert_eq!(client.created.load(Ordering::SeqCst), 1);
        assert_eq!(client.bulk_calls.load(Ordering::SeqCst), 0);
    }
}
