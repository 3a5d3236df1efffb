//! MySQL source implementation.
//!
//! A single connection is established lazily on first use and cached for the
//! lifetime of the source, so the fetch and watermark phases of a run share
//! one session.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Params, TxOpts};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::errors::DatabaseError;
use crate::interfaces::SourceDatabase;
use crate::mysql::values::{row_to_source_row, to_param};
use crate::types::Statement;
use es_indexer_shared::{RdsConfig, SourceRow};

/// Port used when the endpoint does not name one.
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// MySQL-backed [`SourceDatabase`].
pub struct MySqlSource {
    opts: Opts,
    endpoint: String,
    connect_timeout: Duration,
    conn: Mutex<Option<Conn>>,
}

impl MySqlSource {
    /// Create a source from the `rds` configuration section.
    ///
    /// No connection is made until the first statement runs.
    pub fn new(config: &RdsConfig) -> Result<Self, DatabaseError> {
        let (host, port) = parse_endpoint(&config.endpoint)?;

        let opts = OptsBuilder::default()
            .ip_or_hostname(host)
            .tcp_port(port)
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()));

        Ok(Self {
            opts: opts.into(),
            endpoint: config.endpoint.clone(),
            connect_timeout: Duration::from_secs(config.timeout),
            conn: Mutex::new(None),
        })
    }

    async fn connect(&self) -> Result<Conn, DatabaseError> {
        let start = Instant::now();

        let conn = tokio::time::timeout(self.connect_timeout, Conn::new(self.opts.clone()))
            .await
            .map_err(|_| {
                DatabaseError::timeout(format!(
                    "connecting to {} timed out, current timeout {}s, you can increase it via key timeout in the rds section",
                    self.endpoint,
                    self.connect_timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                DatabaseError::connection(format!(
                    "connecting to {} failed (current timeout {}s): {}",
                    self.endpoint,
                    self.connect_timeout.as_secs(),
                    e
                ))
            })?;

        info!(
            endpoint = %self.endpoint,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Connected to MySQL"
        );
        Ok(conn)
    }

    /// Lock the cached connection, establishing it first if needed.
    async fn session(&self) -> Result<MutexGuard<'_, Option<Conn>>, DatabaseError> {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            *guard = Some(self.connect().await?);
        }
        Ok(guard)
    }

    /// Close the cached connection, if any.
    pub async fn disconnect(&self) {
        if let Some(conn) = self.conn.lock().await.take() {
            if let Err(e) = conn.disconnect().await {
                warn!(error = %e, "Failed to close MySQL connection");
            }
        }
    }

    async fn run_statements(
        tx: &mut mysql_async::Transaction<'_>,
        statements: &[Statement],
    ) -> Result<u64, DatabaseError> {
        let mut affected = 0;
        for statement in statements {
            let params: Vec<mysql_async::Value> = statement.params.iter().map(to_param).collect();
            tx.exec_drop(statement.sql.as_str(), params)
                .await
                .map_err(|e| DatabaseError::from_mysql(e, &statement.sql))?;
            affected += tx.affected_rows();
        }
        Ok(affected)
    }
}

#[async_trait]
impl SourceDatabase for MySqlSource {
    #[instrument(skip(self))]
    async fn execute_strict(&self, sql: &str) -> Result<(), DatabaseError> {
        let mut guard = self.session().await?;
        let conn = guard
            .as_mut()
            .ok_or_else(|| DatabaseError::connection("connection not available"))?;

        conn.query_drop(sql)
            .await
            .map_err(|e| DatabaseError::from_mysql(e, sql))?;

        if conn.get_warnings() > 0 {
            let warnings: Vec<(String, u32, String)> = conn
                .query("SHOW WARNINGS")
                .await
                .map_err(|e| DatabaseError::from_mysql(e, "SHOW WARNINGS"))?;

            let description = warnings
                .iter()
                .map(|(level, code, message)| format!("{} {}: {}", level, code, message))
                .collect::<Vec<_>>()
                .join("; ");

            return Err(DatabaseError::WarningError {
                sql: sql.to_string(),
                warnings: description,
            });
        }

        Ok(())
    }

    async fn fetch_rows(&self, sql: &str) -> Result<Vec<SourceRow>, DatabaseError> {
        let mut guard = self.session().await?;
        let conn = guard
            .as_mut()
            .ok_or_else(|| DatabaseError::connection("connection not available"))?;

        // The binary protocol returns typed values instead of text.
        let rows: Vec<mysql_async::Row> = conn
            .exec(sql, Params::Empty)
            .await
            .map_err(|e| DatabaseError::from_mysql(e, sql))?;

        debug!(rows = rows.len(), "Fetched rows");
        Ok(rows.into_iter().map(row_to_source_row).collect())
    }

    async fn execute_transaction(&self, statements: &[Statement]) -> Result<u64, DatabaseError> {
        let mut guard = self.session().await?;
        let conn = guard
            .as_mut()
            .ok_or_else(|| DatabaseError::connection("connection not available"))?;

        let mut tx = conn
            .start_transaction(TxOpts::default())
            .await
            .map_err(|e| DatabaseError::from_mysql(e, "START TRANSACTION"))?;

        match Self::run_statements(&mut tx, statements).await {
            Ok(affected) => {
                tx.commit()
                    .await
                    .map_err(|e| DatabaseError::from_mysql(e, "COMMIT"))?;
                Ok(affected)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}

/// Split `host[:port]`, defaulting the port to 3306.
fn parse_endpoint(endpoint: &str) -> Result<(String, u16), DatabaseError> {
    match endpoint.split_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|e| {
                DatabaseError::configuration(format!("invalid port in rds endpoint {}: {}", endpoint, e))
            })?;
            Ok((host.to_string(), port))
        }
        None if endpoint.is_empty() => Err(DatabaseError::configuration("rds endpoint is empty")),
        None => Ok((endpoint.to_string(), DEFAULT_MYSQL_PORT)),
    }
}
