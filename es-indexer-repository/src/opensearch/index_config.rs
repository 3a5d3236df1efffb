//! Index creation settings.
//!
//! Mappings are left to the search engine's dynamic mapping; only shard and
//! replica counts are configured when the indexer creates an index.

use serde_json::{json, Map, Value};

use es_indexer_shared::IndexSettings;

/// Build the request body used to create an index.
///
/// Only the configured settings are included, so an index configured with
/// shards but no replicas gets the engine's default replica count.
pub fn index_settings_body(settings: &IndexSettings) -> Value {
    let mut index = Map::new();
    if let Some(shards) = settings.shards {
        index.insert("number_of_shards".to_string(), json!(shards));
    }
    if let Some(replicas) = settings.replicas {
        index.insert("number_of_replicas".to_string(), json!(replicas));
    }

    json!({ "settings": index })
}
