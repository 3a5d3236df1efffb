//! Source database trait definition.

use async_trait::async_trait;

use crate::errors::DatabaseError;
use crate::types::Statement;
use es_indexer_shared::SourceRow;

/// Abstracts the relational store rows are read from and watermarks are
/// written to.
///
/// Implementations hold a single connection for their lifetime, established
/// on first use, so the fetch and update phases of a run share it.
#[async_trait]
pub trait SourceDatabase: Send + Sync {
    /// Execute a statement, failing if the server reports any warning.
    async fn execute_strict(&self, sql: &str) -> Result<(), DatabaseError>;

    /// Run a SELECT and return its rows with columns in result-set order.
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<SourceRow>, DatabaseError>;

    /// Execute all statements inside one transaction.
    ///
    /// Either every statement is committed or none is. Returns the total
    /// number of affected rows.
    async fn execute_transaction(&self, statements: &[Statement]) -> Result<u64, DatabaseError>;
}
