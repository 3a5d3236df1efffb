//! Database error types.
//!
//! Errors are classified so callers can tell lock contention, which is
//! worth retrying, from everything else, which is not.

use thiserror::Error;

/// MySQL server error: lock wait timeout exceeded.
pub const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;

/// MySQL server error: deadlock found when trying to get lock.
pub const ER_LOCK_DEADLOCK: u16 = 1213;

/// Errors that can occur while talking to the relational store.
#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    /// Invalid connection settings.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The database could not be reached or the session broke.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Connecting took longer than the configured timeout.
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// A statement run in strict mode produced warnings.
    #[error("SQL warning in `{sql}`: {warnings}")]
    WarningError { sql: String, warnings: String },

    /// A statement failed.
    #[error("Query error in `{sql}`: {message}")]
    QueryError { sql: String, message: String },

    /// Deadlock or lock-wait timeout.
    #[error("Lock contention (code {code}) in `{sql}`: {message}")]
    LockContention {
        code: u16,
        sql: String,
        message: String,
    },
}

impl DatabaseError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::ConfigurationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::TimeoutError(msg.into())
    }

    /// Create a query error.
    pub fn query(sql: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueryError {
            sql: sql.into(),
            message: message.into(),
        }
    }

    /// Create a lock contention error.
    pub fn lock_contention(code: u16, sql: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LockContention {
            code,
            sql: sql.into(),
            message: message.into(),
        }
    }

    /// Whether the error is a deadlock or lock-wait timeout.
    pub fn is_lock_contention(&self) -> bool {
        matches!(self, Self::LockContention { .. })
    }

    /// Classify a driver error raised while running `sql`.
    pub fn from_mysql(err: mysql_async::Error, sql: &str) -> Self {
        match err {
            mysql_async::Error::Server(server)
                if server.code == ER_LOCK_DEADLOCK || server.code == ER_LOCK_WAIT_TIMEOUT =>
            {
                Self::lock_contention(server.code, sql, server.message)
            }
            mysql_async::Error::Server(server) => {
                Self::query(sql, format!("{} ({})", server.message, server.code))
            }
            mysql_async::Error::Io(io) => Self::connection(io.to_string()),
            other => Self::query(sql, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_contention_classification() {
        let err = DatabaseError::lock_contention(ER_LOCK_DEADLOCK, "UPDATE t", "deadlock");
        assert!(err.is_lock_contention());

        let err = DatabaseError::query("UPDATE t", "syntax error");
        assert!(!err.is_lock_contention());
    }

    #[test]
    fn test_error_messages_carry_statement() {
        let err = DatabaseError::query("SELECT broken", "unknown column");
        assert!(err.to_string().contains("SELECT broken"));
    }
}
