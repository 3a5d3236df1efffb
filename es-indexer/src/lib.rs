//! # ES Indexer
//!
//! Main library for the periodic MySQL to Elasticsearch/OpenSearch indexer.
//!
//! This crate provides the entry point, configuration loading and logging
//! setup for running one indexing pass of the pipeline.

pub mod config;
pub mod logging;

pub use config::{Dependencies, InvocationSettings};

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] es_indexer_pipeline::PipelineError),

    /// Database error.
    #[error("Database error: {0}")]
    DatabaseError(#[from] es_indexer_repository::DatabaseError),

    /// Search error.
    #[error("Search error: {0}")]
    SearchError(#[from] es_indexer_repository::SearchIndexError),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
