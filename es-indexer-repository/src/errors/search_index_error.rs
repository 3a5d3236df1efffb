//! Search index error types.
//!
//! This module defines the error types that can occur while talking to the
//! search engine.

use std::error::Error as StdError;

use thiserror::Error;

/// Errors that can occur during search index operations.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Invalid client configuration (e.g. malformed endpoint URL).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Failed to establish a connection to the search engine.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request was sent but no response arrived in time.
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// The search engine answered with an unexpected HTTP status.
    #[error("HTTP error {status}: {body}")]
    HttpError { status: u16, body: String },

    /// Failed to create the search index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// Failed to parse a response from the search engine.
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl SearchIndexError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::ConfigurationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::TimeoutError(msg.into())
    }

    /// Create an HTTP status error.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::HttpError {
            status,
            body: body.into(),
        }
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Whether the request timed out waiting for a response.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimeoutError(_))
    }
}

impl From<opensearch::Error> for SearchIndexError {
    fn from(err: opensearch::Error) -> Self {
        let timed_out = err.is_timeout();
        Self::from_transport(&err, timed_out)
    }
}

impl SearchIndexError {
    /// Classify a transport failure.
    ///
    /// A failure to establish the connection is a `ConnectionError` even when
    /// the connect attempt ran into the request timeout. Only requests that
    /// timed out after connecting become `TimeoutError`.
    pub(crate) fn from_transport(err: &(dyn StdError + 'static), timed_out: bool) -> Self {
        if is_connect_failure(err) {
            Self::ConnectionError(err.to_string())
        } else if timed_out {
            Self::TimeoutError(err.to_string())
        } else {
            Self::ConnectionError(err.to_string())
        }
    }
}

fn is_connect_failure(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.downcast_ref::<reqwest::Error>().is_some_and(reqwest::Error::is_connect) {
            return true;
        }
        current = e.source();
    }
    false
}
