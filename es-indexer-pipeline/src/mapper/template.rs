//! Mapping template parsed from the `mapping` configuration section.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::value::encode_value;
use crate::errors::PipelineError;
use es_indexer_shared::{FieldKind, SourceRow};

const ID_KEY: &str = "_id";
const TYPE_KEY: &str = "_type";
const COMMENT_KEY: &str = "_comment";

/// Prefix marking a placeholder leaf.
pub const PLACEHOLDER_PREFIX: char = '$';

/// The document template with `_id` and `_type` split off.
#[derive(Debug, Clone)]
pub struct MappingTemplate {
    id: String,
    doc_type: String,
    body: Value,
}

/// One rendered document and the id it is indexed under.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub id: String,
    pub body: Value,
}

impl MappingTemplate {
    /// Parse the template, removing `_comment`.
    ///
    /// # Errors
    ///
    /// `PipelineError::MappingError` if `_id` or `_type` is missing or not a
    /// string.
    pub fn parse(mapping: &Map<String, Value>) -> Result<Self, PipelineError> {
        let mut body = mapping.clone();
        body.remove(COMMENT_KEY);

        let id = take_string(&mut body, ID_KEY)
            .ok_or_else(|| PipelineError::mapping("internal _id mapping is missing"))?;
        let doc_type = take_string(&mut body, TYPE_KEY)
            .ok_or_else(|| PipelineError::mapping("internal _type mapping is missing"))?;

        Ok(Self {
            id,
            doc_type,
            body: Value::Object(body),
        })
    }

    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    /// Render the document for `row`.
    ///
    /// Each leaf equal to `$column` is replaced by the encoded column value.
    /// Leaves naming a column the row does not have stay as they are.
    pub fn render(
        &self,
        row: &SourceRow,
        field_kinds: &BTreeMap<String, FieldKind>,
    ) -> Result<RenderedDocument, PipelineError> {
        let id = match placeholder_name(&self.id).and_then(|name| row.get(name)) {
            Some(value) => value.to_string(),
            None => self.id.clone(),
        };

        if id.contains(PLACEHOLDER_PREFIX) {
            return Err(PipelineError::mapping(format!(
                "no database field for internal _id mapping {} found",
                self.id
            )));
        }

        let body = substitute(&self.body, row, field_kinds)?;
        Ok(RenderedDocument { id, body })
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// Column name referenced by a `$column` leaf.
pub fn placeholder_name(leaf: &str) -> Option<&str> {
    leaf.strip_prefix(PLACEHOLDER_PREFIX)
        .filter(|name| !name.is_empty())
}

fn substitute(
    node: &Value,
    row: &SourceRow,
    field_kinds: &BTreeMap<String, FieldKind>,
) -> Result<Value, PipelineError> {
    match node {
        Value::String(leaf) => match placeholder_name(leaf)
            .and_then(|name| row.get(name).map(|value| (name, value)))
        {
            Some((name, value)) => encode_value(name, value, field_kinds.get(name).copied()),
            None => Ok(node.clone()),
        },
        Value::Array(items) => items
            .iter()
            .map(|item| substitute(item, row, field_kinds))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(fields) => {
            let mut rendered = Map::with_capacity(fields.len());
            for (key, child) in fields {
                rendered.insert(key.clone(), substitute(child, row, field_kinds)?);
            }
            Ok(Value::Object(rendered))
        }
        other => Ok(other.clone()),
    }
}
