//! Mapper module for the indexer pipeline.
//!
//! Turns fetched rows into a size-bounded bulk batch plus the update keys of
//! exactly the rows that made it into the batch.

mod batch;
mod template;
mod value;

pub use batch::{BulkBatch, MAX_BULK_BYTES};
pub use template::{MappingTemplate, RenderedDocument};
pub use value::{clean_text, encode_value};

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::errors::PipelineError;
use es_indexer_shared::{FieldKind, IndexerConfig, SourceRow, UpdateKey};

/// Parsed `last-modified-timestamp-upd-key`, e.g. `id=$product_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateKeySpec {
    /// Column used in the WHERE clause of the watermark reset.
    pub predicate: String,
    /// Row column whose value identifies the row.
    pub source_field: String,
}

impl UpdateKeySpec {
    pub fn parse(spec: &str) -> Result<Self, PipelineError> {
        let malformed = || {
            PipelineError::config(format!(
                "sql.last-modified-timestamp-upd-key must look like id=$id_doc, got {}",
                spec
            ))
        };

        let (predicate, variable) = spec.split_once('=').ok_or_else(malformed)?;
        let predicate = predicate.trim();
        let source_field = template::placeholder_name(variable.trim()).ok_or_else(malformed)?;
        if predicate.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            predicate: predicate.to_string(),
            source_field: source_field.to_string(),
        })
    }
}

/// One row rendered for the bulk payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    pub action: Value,
    pub document: Value,
    pub update_key: UpdateKey,
}

/// Result of mapping the rows of a run.
#[derive(Debug, Clone)]
pub struct MappedBatch {
    pub batch: BulkBatch,
    /// One key per batched document, in batch order.
    pub update_keys: Vec<UpdateKey>,
    /// Rows left out because the batch was full.
    pub rows_deferred: usize,
    pub elapsed: Duration,
}

/// Renders rows through the mapping template into a bulk batch.
#[derive(Debug, Clone)]
pub struct DocumentMapper {
    index_name: String,
    template: MappingTemplate,
    update_key: UpdateKeySpec,
    field_kinds: BTreeMap<String, FieldKind>,
    max_batch_bytes: usize,
}

impl DocumentMapper {
    /// Create a mapper for `index_name` from the loaded configuration.
    ///
    /// # Errors
    ///
    /// `MappingError` for an invalid template, `ConfigError` for a missing
    /// or malformed update key.
    pub fn new(index_name: impl Into<String>, config: &IndexerConfig) -> Result<Self, PipelineError> {
        let template = MappingTemplate::parse(&config.mapping)?;

        let update_key = config
            .sql
            .last_modified_timestamp_upd_key
            .as_deref()
            .ok_or_else(|| PipelineError::config("missing key: sql.last-modified-timestamp-upd-key"))
            .and_then(UpdateKeySpec::parse)?;

        Ok(Self {
            index_name: index_name.into(),
            template,
            update_key,
            field_kinds: config.field_kinds.clone(),
            max_batch_bytes: MAX_BULK_BYTES,
        })
    }

    /// Override the payload ceiling.
    pub fn with_max_batch_bytes(mut self, max_batch_bytes: usize) -> Self {
        self.max_batch_bytes = max_batch_bytes;
        self
    }

    /// Render one row into its action line, document and update key.
    pub fn map_row(&self, row: &SourceRow) -> Result<MappedRow, PipelineError> {
        let rendered = self.template.render(row, &self.field_kinds)?;

        let key_value = row.get(&self.update_key.source_field).ok_or_else(|| {
            PipelineError::mapping(format!(
                "row has no field {} for the watermark update key",
                self.update_key.source_field
            ))
        })?;

        let action = json!({
            "index": {
                "_index": self.index_name,
                "_type": self.template.doc_type(),
                "_id": rendered.id,
            }
        });

        Ok(MappedRow {
            action,
            document: rendered.body,
            update_key: UpdateKey::new(self.update_key.predicate.clone(), key_value.clone()),
        })
    }

    /// Map `rows` in order until the batch is full.
    ///
    /// A mapping error on any row fails the whole batch.
    #[instrument(skip(self, rows), fields(index = %self.index_name, rows = rows.len()))]
    pub fn map_rows(&self, rows: &[SourceRow]) -> Result<MappedBatch, PipelineError> {
        let start = Instant::now();
        let mut batch = BulkBatch::with_max_bytes(self.max_batch_bytes);
        let mut update_keys = Vec::with_capacity(rows.len());

        for row in rows {
            let mapped = self.map_row(row)?;
            if !batch.try_push(&mapped.action, &mapped.document)? {
                break;
            }
            update_keys.push(mapped.update_key);
        }

        let rows_deferred = rows.len() - update_keys.len();
        if rows_deferred > 0 {
            warn!(
                batched = update_keys.len(),
                deferred = rows_deferred,
                max_bytes = self.max_batch_bytes,
                "Bulk payload ceiling reached, remaining rows deferred to the next run"
            );
        }

        let elapsed = start.elapsed();
        info!(
            documents = batch.len(),
            bytes = batch.byte_len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Mapped rows"
        );

        Ok(MappedBatch {
            batch,
            update_keys,
            rows_deferred,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use es_indexer_shared::FieldValue;

    fn config(mapping: Value, upd_key: &str) -> IndexerConfig {
        let mut config: IndexerConfig = serde_json::from_value(json!({
            "rds": {"endpoint": "localhost", "user": "u", "password": "p"},
            "es": {"endpoint": "http://localhost:9200"},
            "sql": {
                "data": [{"schema": "shop", "table": "products", "fields": ["id", "name"]}],
                "last-modified-timestamp-field": "shop.products.indexed_at",
                "last-modified-timestamp-upd-key": upd_key
            }
        }))
        .unwrap();
        config.mapping = mapping.as_object().cloned().unwrap_or_default();
        config
    }

    fn product_mapper() -> DocumentMapper {
        let mapping = json!({"_id": "$id", "_type": "product", "name": "$name", "price": "$price"});
        DocumentMapper::new("products", &config(mapping, "id=$id")).unwrap()
    }

    fn lines(batch: &BulkBatch) -> Vec<Value> {
        batch
            .to_string()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_update_key_spec_parse() {
        assert_eq!(
            UpdateKeySpec::parse("product_id=$id").unwrap(),
            UpdateKeySpec {
                predicate: "product_id".to_string(),
                source_field: "id".to_string()
            }
        );
        assert!(UpdateKeySpec::parse("product_id").is_err());
        assert!(UpdateKeySpec::parse("product_id=id").is_err());
        assert!(UpdateKeySpec::parse("=$id").is_err());
    }

    #[test]
    fn test_map_rows_produces_action_and_document_lines() {
        let rows = vec![
            SourceRow::new()
                .with("id", 1i64)
                .with("name", r#"O'Brien "Inc""#)
                .with("price", 12.5),
            SourceRow::new()
                .with("id", 2i64)
                .with("name", "Lamp")
                .with("price", FieldValue::Null),
        ];

        let mapped = product_mapper().map_rows(&rows).unwrap();

        assert_eq!(mapped.batch.len(), 2);
        assert_eq!(mapped.rows_deferred, 0);
        assert_eq!(
            lines(&mapped.batch),
            vec![
                json!({"index": {"_index": "products", "_type": "product", "_id": "1"}}),
                json!({"name": "O'Brien \"Inc\"", "price": 12.5}),
                json!({"index": {"_index": "products", "_type": "product", "_id": "2"}}),
                json!({"name": "Lamp", "price": null}),
            ]
        );
        assert!(mapped
            .batch
            .to_string()
            .contains(r#"{"name":"O'Brien \"Inc\"","price":12.5}"#));
        assert_eq!(
            mapped.update_keys,
            vec![
                UpdateKey::new("id", FieldValue::Int(1)),
                UpdateKey::new("id", FieldValue::Int(2)),
            ]
        );
    }

    #[test]
    fn test_action_line_key_order() {
        let rows = vec![SourceRow::new().with("id", 5i64).with("name", "x").with("price", 1i64)];
        let mapped = product_mapper().map_rows(&rows).unwrap();

        assert!(mapped
            .batch
            .to_string()
            .starts_with(r#"{"index":{"_index":"products","_type":"product","_id":"5"}}"#));
    }

    #[test]
    fn test_batch_never_exceeds_ceiling() {
        let big = "x".repeat(1024 * 1024);
        let rows: Vec<SourceRow> = (0..6)
            .map(|id| {
                SourceRow::new()
                    .with("id", id as i64)
                    .with("name", big.as_str())
                    .with("price", 1i64)
            })
            .collect();

        let mapped = product_mapper().map_rows(&rows).unwrap();

        assert!(mapped.batch.byte_len() <= MAX_BULK_BYTES);
        assert_eq!(mapped.batch.len(), 4);
        assert_eq!(mapped.rows_deferred, 2);
        assert_eq!(mapped.update_keys.len(), 4);
        assert_eq!(mapped.update_keys[3].value, FieldValue::Int(3));
    }

    #[test]
    fn test_oversized_first_document_defers_every_row() {
        let rows: Vec<SourceRow> = (0..3)
            .map(|id| {
                SourceRow::new()
                    .with("id", id as i64)
                    .with("name", "a product name longer than the ceiling")
                    .with("price", 1i64)
            })
            .collect();

        let mapped = product_mapper().with_max_batch_bytes(64).map_rows(&rows).unwrap();

        assert!(mapped.batch.is_empty());
        assert!(mapped.update_keys.is_empty());
        assert_eq!(mapped.rows_deferred, 3);
    }

    #[test]
    fn test_unresolved_id_fails_the_batch() {
        let mapping = json!({"_id": "$doc_id", "_type": "product", "name": "$name"});
        let mapper = DocumentMapper::new("products", &config(mapping, "id=$id")).unwrap();
        let rows = vec![SourceRow::new().with("id", 1i64).with("name", "x")];

        assert!(matches!(
            mapper.map_rows(&rows),
            Err(PipelineError::MappingError(_))
        ));
    }

    #[test]
    fn test_missing_update_key_field_fails() {
        let mapping = json!({"_id": "$id", "_type": "product"});
        let mapper = DocumentMapper::new("products", &config(mapping, "id=$product_id")).unwrap();
        let rows = vec![SourceRow::new().with("id", 1i64)];

        assert!(matches!(
            mapper.map_rows(&rows),
            Err(PipelineError::MappingError(_))
        ));
    }

    #[test]
    fn test_missing_template_keys_fail_construction() {
        let mapping = json!({"_type": "product"});
        assert!(matches!(
            DocumentMapper::new("products", &config(mapping, "id=$id")),
            Err(PipelineError::MappingError(_))
        ));
    }

    #[test]
    fn test_empty_input_gives_empty_batch() {
        let mapped = product_mapper().map_rows(&[]).unwrap();
        assert!(mapped.batch.is_empty());
        assert!(mapped.update_keys.is_empty());
    }
}
