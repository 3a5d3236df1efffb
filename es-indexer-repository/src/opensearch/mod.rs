//! OpenSearch implementation of the search index provider.
//!
//! The same HTTP surface is served by Elasticsearch, so the client works
//! against either engine.

mod client;
mod index_config;

pub use client::OpenSearchClient;
pub use index_config::index_settings_body;
