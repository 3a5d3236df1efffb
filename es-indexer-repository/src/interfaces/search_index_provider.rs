//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index operations,
//! allowing for different backend implementations (OpenSearch, Elasticsearch, etc.).

use async_trait::async_trait;

use crate::errors::SearchIndexError;
use crate::types::BulkResponse;
use es_indexer_shared::IndexSettings;

/// Abstracts the underlying search index implementation (OpenSearch, Elasticsearch, etc.).
///
/// Implementations are injected into the bulk submitter to enable dependency
/// injection and easy testing with mock implementations.
///
/// Transport failures are reported as `SearchIndexError::TimeoutError` when
/// the request was sent but no response arrived in time, and as
/// `SearchIndexError::ConnectionError` otherwise.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Check whether an index exists.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The index exists (HTTP 200)
    /// * `Ok(false)` - The index does not exist (HTTP 404)
    /// * `Err(SearchIndexError::HttpError)` - Any other status
    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError>;

    /// Create an index with the given shard and replica settings.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The index was created (HTTP 200)
    /// * `Err(SearchIndexError::IndexCreationError)` - Any other status
    async fn create_index(
        &self,
        index: &str,
        settings: &IndexSettings,
    ) -> Result<(), SearchIndexError>;

    /// Send a newline-delimited bulk payload.
    ///
    /// The response is returned whatever its status; deciding whether a
    /// status is acceptable is the caller's concern.
    async fn bulk(&self, payload: &[u8]) -> Result<BulkResponse, SearchIndexError>;
}
