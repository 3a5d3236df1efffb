//! Error types for the indexer repository.

mod database_error;
mod search_index_error;

pub use database_error::DatabaseError;
pub use search_index_error::SearchIndexError;
