//! # ES Indexer Repository
//!
//! This crate provides traits and implementations for the two external
//! systems the indexer talks to: the search engine that receives bulk
//! writes and the relational store that supplies rows and carries the
//! watermark. It includes definitions for errors, interfaces, and concrete
//! implementations for OpenSearch and MySQL.

pub mod errors;
pub mod interfaces;
pub mod mysql;
pub mod opensearch;
pub mod types;

pub use errors::{DatabaseError, SearchIndexError};
pub use interfaces::{SearchIndexProvider, SourceDatabase};
pub use mysql::MySqlSource;
pub use opensearch::OpenSearchClient;
pub use types::{BulkResponse, Statement};
