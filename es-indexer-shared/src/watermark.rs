//! Watermark column and per-row update keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::row::FieldValue;

/// Watermark value that marks a row as pending (re)indexing.
pub const WATERMARK_SENTINEL: &str = "1970-01-01 00:00:00";

/// A fully qualified `schema.table.field` watermark column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkColumn {
    pub schema: String,
    pub table: String,
    pub field: String,
}

impl WatermarkColumn {
    /// Parse a `schema.table.field` reference.
    ///
    /// Returns `None` unless the reference has exactly three non-empty parts.
    pub fn parse(reference: &str) -> Option<Self> {
        let parts: Vec<&str> = reference.trim().split('.').collect();
        match parts.as_slice() {
            [schema, table, field]
                if !schema.is_empty() && !table.is_empty() && !field.is_empty() =>
            {
                Some(Self {
                    schema: schema.to_string(),
                    table: table.to_string(),
                    field: field.to_string(),
                })
            }
            _ => None,
        }
    }

    /// `schema.table`
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

impl fmt::Display for WatermarkColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.schema, self.table, self.field)
    }
}

/// Identifies one source row whose watermark is reset after indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateKey {
    /// Column used in the `WHERE` predicate.
    pub predicate: String,
    /// Literal value of that column for the row.
    pub value: FieldValue,
}

impl UpdateKey {
    pub fn new(predicate: impl Into<String>, value: FieldValue) -> Self {
        Self {
            predicate: predicate.into(),
            value,
        }
    }
}

impl fmt::Display for UpdateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.predicate, self.value)
    }
}
