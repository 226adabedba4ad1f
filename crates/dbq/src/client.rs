//! Driver boundary.
//!
//! The builder and router never talk to a database themselves: they hand
//! rendered SQL plus bind arguments to a [`DatabaseClient`], created on demand
//! by a [`Connector`]. The bundled `postgres` feature provides both for
//! tokio-postgres; tests and other engines plug in their own.

use crate::config::Endpoint;
use crate::value::Value;
use std::future::Future;

/// Raw result of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub rows_affected: u64,
    /// `false` for statements that produce no result set (INSERT/UPDATE/DELETE).
    pub has_result_set: bool,
}

impl ResultSet {
    /// Result of a statement without a result set.
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Self::default()
        }
    }

    /// Result set with rows.
    pub fn rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let rows_affected = rows.len() as u64;
        Self {
            columns,
            rows,
            rows_affected,
            has_result_set: true,
        }
    }
}

/// Driver-reported failure: `(SQLSTATE, driver code, driver message)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[{sql_state}] {message}")]
pub struct DriverError {
    pub sql_state: String,
    pub driver_code: Option<i64>,
    pub message: String,
}

impl DriverError {
    pub fn new(sql_state: impl Into<String>, driver_code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            sql_state: sql_state.into(),
            driver_code,
            message: message.into(),
        }
    }

    /// Generic failure without a specific SQLSTATE.
    pub fn other(message: impl Into<String>) -> Self {
        Self::new("HY000", None, message)
    }

    /// Failure to establish a connection.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new("08001", None, message)
    }

    /// The `(sql_state, driver_code, message)` tuple.
    pub fn info(&self) -> (&str, Option<i64>, &str) {
        (&self.sql_state, self.driver_code, &self.message)
    }
}

/// A physical connection able to run statements.
pub trait DatabaseClient: Send + Sync {
    /// Execute one statement with positional bind arguments.
    fn execute(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<ResultSet, DriverError>> + Send;

    /// Quote and escape a string literal.
    ///
    /// The default doubles single quotes, which is valid in both supported
    /// dialects with standard-conforming strings.
    fn quote(&self, text: &str) -> String {
        format!("'{}'", text.replace('\'', "''"))
    }
}

/// Creates clients for endpoints.
pub trait Connector: Send + Sync {
    type Client: DatabaseClient + 'static;

    fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<Self::Client, DriverError>> + Send;
}
