//! Configuration document types.
//!
//! The indexer is driven by one JSON document per target index with the
//! sections `rds`, `es`, `sql`, `mapping`, and optionally `field-kinds` and
//! `settings`. Keys are kebab-case except for the connection sections, which
//! keep their historical snake_case names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_timeout_secs() -> u64 {
    3
}

fn default_retry() -> u32 {
    1
}

fn default_retry_wait_secs() -> u64 {
    1
}

fn default_true() -> bool {
    true
}

/// The complete configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexerConfig {
    pub rds: RdsConfig,
    pub es: EsConfig,
    pub sql: SqlConfig,
    /// Document template with `$field` placeholders.
    #[serde(default)]
    pub mapping: Map<String, Value>,
    /// Explicit value kinds for individual fields, overriding type sniffing.
    #[serde(default)]
    pub field_kinds: BTreeMap<String, FieldKind>,
    #[serde(default)]
    pub settings: Option<IndexSettings>,
}

/// Relational store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RdsConfig {
    /// `host` or `host:port`.
    pub endpoint: String,
    pub user: String,
    pub password: String,
    /// Connect timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout: u64,
    /// Additional attempts on lock contention during watermark updates.
    #[serde(default = "default_retry")]
    pub retry: u32,
    #[serde(default = "default_retry_wait_secs")]
    pub retry_wait_sec: u64,
}

/// Search engine connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsConfig {
    /// Base URL, e.g. `https://127.0.0.1:9200`.
    pub endpoint: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout: u64,
    /// Total bulk attempts when the request times out.
    #[serde(default = "default_retry")]
    pub retry: u32,
    #[serde(default = "default_retry_wait_secs")]
    pub retry_wait_sec: u64,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_true", rename = "verify-certificates")]
    pub verify_certificates: bool,
}

impl EsConfig {
    /// Basic-auth credentials, when both user and password are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.user.as_deref(), self.password.as_deref()) {
            (Some(user), Some(password)) if !user.is_empty() => Some((user, password)),
            _ => None,
        }
    }
}

/// Declarative description of the SELECT and the watermark.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SqlConfig {
    /// Primary table first, then left-joined tables in order.
    #[serde(default)]
    pub data: Vec<TableSpec>,
    /// `schema.table.field` of the watermark column.
    #[serde(default)]
    pub last_modified_timestamp_field: Option<String>,
    /// `predicate=$field`, identifying the row to re-arm.
    #[serde(default)]
    pub last_modified_timestamp_upd_key: Option<String>,
    #[serde(default)]
    pub group_by: Option<String>,
    /// `ASC` or `DESC`.
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub additional_where: Option<String>,
    /// Column used for `BETWEEN` paging in full-reindex mode.
    #[serde(default)]
    pub additional_primary_key_for_full_indexing: Option<String>,
    /// Statement run before the SELECT.
    #[serde(default)]
    pub query_pre: Option<String>,
    #[serde(default)]
    pub update_strategy: UpdateStrategy,
}

/// One table of the SELECT.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSpec {
    pub schema: String,
    pub table: String,
    #[serde(default)]
    pub fields: Vec<String>,
    /// Explicit join condition; ignored for the primary table.
    #[serde(default)]
    pub join: Option<String>,
}

impl TableSpec {
    /// `schema.table`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

/// How watermark resets are issued inside the update transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateStrategy {
    /// One `UPDATE` per key.
    #[default]
    PerRow,
    /// One `UPDATE ... WHERE key IN (...)` per predicate column.
    Consolidated,
}

/// Declared JSON kind of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Null,
    RawJson,
    Datetime,
}

/// Shard and replica settings applied when the index is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSettings {
    #[serde(default)]
    pub shards: Option<u32>,
    #[serde(default)]
    pub replicas: Option<u32>,
}

impl IndexSettings {
    /// Whether any index setting is configured.
    pub fn is_configured(&self) -> bool {
        self.shards.is_some() || self.replicas.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "rds": { "endpoint": "db.local:3307", "user": "indexer", "password": "secret" },
            "es": { "endpoint": "http://localhost:9200", "retry": 3, "retry_wait_sec": 2 },
            "sql": {
                "data": [
                    { "schema": "shop", "table": "products", "fields": ["id", "name"] },
                    { "schema": "shop", "table": "brands", "fields": ["label"], "join": "brands.id = products.brand_id" }
                ],
                "last-modified-timestamp-field": "shop.products.indexed_at",
                "last-modified-timestamp-upd-key": "id=$id",
                "update-strategy": "consolidated"
            },
            "mapping": { "_id": "$id", "_type": "product", "name": "$name" },
            "field-kinds": { "name": "string" },
            "settings": { "shards": 2 }
        })
    }

    #[test]
    fn test_deserialize_full_document() {
        let config: IndexerConfig = serde_json::from_value(sample()).unwrap();

        assert_eq!(config.rds.timeout, 3);
        assert_eq!(config.rds.retry, 1);
        assert_eq!(config.es.retry, 3);
        assert_eq!(config.es.retry_wait_sec, 2);
        assert!(config.es.verify_certificates);
        assert!(config.es.credentials().is_none());
        assert_eq!(config.sql.data.len(), 2);
        assert_eq!(config.sql.data[1].join.as_deref(), Some("brands.id = products.brand_id"));
        assert_eq!(config.sql.update_strategy, UpdateStrategy::Consolidated);
        assert_eq!(config.field_kinds.get("name"), Some(&FieldKind::String));
        assert!(config.settings.unwrap().is_configured());
    }

    #[test]
    fn test_mapping_preserves_key_order() {
        let config: IndexerConfig = serde_json::from_value(sample()).unwrap();
        let keys: Vec<&String> = config.mapping.keys().collect();
        assert_eq!(keys, vec!["_id", "_type", "name"]);
    }

    #[test]
    fn test_missing_connection_key_is_rejected() {
        let mut doc = sample();
        doc["rds"].as_object_mut().unwrap().remove("password");

        let err = serde_json::from_value::<IndexerConfig>(doc).unwrap_err();
        assert!(err.to_string().contains("password"));
    }
}
