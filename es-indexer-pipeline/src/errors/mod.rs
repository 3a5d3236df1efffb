//! Error types for the indexer pipeline.

use es_indexer_repository::{DatabaseError, SearchIndexError};
use thiserror::Error;

/// Errors that can occur in the indexer pipeline.
///
/// Every variant is fatal for the run except where a component documents
/// that it retries a specific kind internally.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Missing or malformed configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A row could not be turned into a document.
    #[error("Mapping error: {0}")]
    MappingError(String),

    /// The database or the search engine could not be reached.
    #[error("Connect error: {0}")]
    ConnectError(String),

    /// A call exceeded its timeout (after any retries).
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// Lock contention persisted through every retry.
    #[error("Lock contention: {0}")]
    LockContention(String),

    /// The search engine answered with an unexpected HTTP status.
    #[error("HTTP error {status}: {context}")]
    HttpError { status: u16, context: String },

    /// Any other database failure.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Any other search engine failure.
    #[error("Search error: {0}")]
    SearchError(String),
}

impl PipelineError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a mapping error.
    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::MappingError(msg.into())
    }

    /// Create an HTTP status error.
    pub fn http(status: u16, context: impl Into<String>) -> Self {
        Self::HttpError {
            status,
            context: context.into(),
        }
    }
}

impl From<DatabaseError> for PipelineError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConfigurationError(msg) => Self::ConfigError(msg),
            DatabaseError::ConnectionError(msg) => Self::ConnectError(msg),
            DatabaseError::TimeoutError(msg) => Self::TimeoutError(msg),
            err @ DatabaseError::LockContention { .. } => Self::LockContention(err.to_string()),
            err => Self::DatabaseError(err.to_string()),
        }
    }
}

impl From<SearchIndexError> for PipelineError {
    fn from(err: SearchIndexError) -> Self {
        match err {
            SearchIndexError::ConfigurationError(msg) => Self::ConfigError(msg),
            SearchIndexError::ConnectionError(msg) => Self::ConnectError(msg),
            SearchIndexError::TimeoutError(msg) => Self::TimeoutError(msg),
            SearchIndexError::HttpError { status, body } => Self::HttpError {
                status,
                context: body,
            },
            err => Self::SearchError(err.to_string()),
        }
    }
}
