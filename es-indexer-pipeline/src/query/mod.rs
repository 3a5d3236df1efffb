//! Query module for the indexer pipeline.
//!
//! Assembles the bounded SELECT that picks the rows of one run from the
//! declarative `sql` configuration section.

use std::fmt;

use crate::errors::PipelineError;
use es_indexer_shared::{SqlConfig, TableSpec, WATERMARK_SENTINEL};

/// Sort direction of the SELECT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn parse(value: &str) -> Result<Self, PipelineError> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            other => Err(PipelineError::config(format!(
                "sql.sort must be ASC or DESC, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "ASC"),
            Self::Desc => write!(f, "DESC"),
        }
    }
}

/// Builds the SELECT for a run.
///
/// The builder is validated once at construction and then renders a query
/// per limit/offset pair.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    tables: Vec<TableSpec>,
    watermark_column: String,
    group_by: Option<String>,
    sort: SortOrder,
    additional_where: Option<String>,
    primary_key: Option<String>,
}

impl QueryBuilder {
    /// Validate the `sql` section and create a builder.
    ///
    /// # Errors
    ///
    /// `PipelineError::ConfigError` if the watermark column or the table list
    /// is missing, if no table lists any field, or if the sort is invalid.
    pub fn from_config(sql: &SqlConfig) -> Result<Self, PipelineError> {
        let watermark_column = non_empty(sql.last_modified_timestamp_field.as_deref())
            .ok_or_else(|| {
                PipelineError::config("missing key: sql.last-modified-timestamp-field")
            })?;

        if sql.data.is_empty() {
            return Err(PipelineError::config("missing key: sql.data"));
        }

        for (position, table) in sql.data.iter().enumerate() {
            if table.schema.trim().is_empty() || table.table.trim().is_empty() {
                return Err(PipelineError::config(format!(
                    "sql.data[{}] needs both schema and table",
                    position
                )));
            }
        }

        if sql.data.iter().all(|table| table.fields.is_empty()) {
            return Err(PipelineError::config("sql.data lists no fields"));
        }

        let sort = match non_empty(sql.sort.as_deref()) {
            Some(sort) => SortOrder::parse(sort)?,
            None => SortOrder::default(),
        };

        Ok(Self {
            tables: sql.data.clone(),
            watermark_column: watermark_column.to_string(),
            group_by: non_empty(sql.group_by.as_deref()).map(str::to_string),
            sort,
            additional_where: non_empty(sql.additional_where.as_deref()).map(str::to_string),
            primary_key: non_empty(sql.additional_primary_key_for_full_indexing.as_deref())
                .map(str::to_string),
        })
    }

    /// Render the SELECT for `limit` rows.
    ///
    /// Without an offset the query picks rows whose watermark differs from the
    /// sentinel. With an offset it performs a full reindex: by primary-key
    /// range when a key column is configured, by `OFFSET` paging otherwise.
    pub fn build(&self, limit: usize, offset: Option<u64>) -> String {
        let mut query = format!(
            "SELECT {} FROM {}",
            self.select_list(),
            self.tables[0].qualified_name()
        );

        for table in &self.tables[1..] {
            match non_empty(table.join.as_deref()) {
                Some(condition) => {
                    query.push_str(&format!(
                        " LEFT JOIN {} ON {}",
                        table.qualified_name(),
                        condition
                    ));
                }
                None => {
                    query.push_str(&format!(" NATURAL LEFT JOIN {}", table.qualified_name()));
                }
            }
        }

        let mut conditions = Vec::new();
        match (offset, &self.primary_key) {
            (None, _) => conditions.push(format!(
                "{} != '{}'",
                self.watermark_column, WATERMARK_SENTINEL
            )),
            (Some(offset), Some(key)) => conditions.push(format!(
                "{} BETWEEN {} AND {}",
                key,
                offset,
                offset.saturating_add(limit as u64)
            )),
            (Some(_), None) => {}
        }
        if let Some(extra) = &self.additional_where {
            conditions.push(format!("({})", extra));
        }
        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }

        if let Some(group_by) = &self.group_by {
            query.push_str(&format!(" GROUP BY {}", group_by));
        }

        let order_column = match (offset, &self.primary_key) {
            (Some(_), Some(key)) => key,
            _ => &self.watermark_column,
        };
        query.push_str(&format!(" ORDER BY {} {}", order_column, self.sort));

        query.push_str(&format!(" LIMIT {}", limit));
        if let (Some(offset), None) = (offset, &self.primary_key) {
            query.push_str(&format!(" OFFSET {}", offset));
        }

        query
    }

    fn select_list(&self) -> String {
        self.tables
            .iter()
            .flat_map(|table| {
                let prefix = table.qualified_name();
                table.fields.iter().map(move |field| {
                    // Dotted names are expressions or already qualified.
                    if field.contains('.') {
                        field.clone()
                    } else {
                        format!("{}.{}", prefix, field)
                    }
                })
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
