//! Interface definitions for the external systems.
//!
//! `SearchIndexProvider` abstracts the search engine and `SourceDatabase`
//! abstracts the relational store, allowing dependency injection and
//! swappable implementations in tests.

mod search_index_provider;
mod source_database;

pub use search_index_provider::SearchIndexProvider;
pub use source_database::SourceDatabase;
