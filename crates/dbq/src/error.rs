//! Error types for dbq

use crate::client::DriverError;
use thiserror::Error;

/// Result type alias for dbq operations
pub type DbResult<T> = Result<T, DbError>;

/// Error types for query building, routing and execution
#[derive(Debug, Error)]
pub enum DbError {
    /// The query instance does not allow this operation
    #[error("{0} is not allowed")]
    OperationNotAllowed(String),

    /// A host value that has no SQL encoding
    #[error("Invalid SQL datatype: {0}")]
    InvalidValueType(String),

    /// Operator string is not one of the supported comparison operators
    #[error("Invalid operator ({0})")]
    UnknownOperator(String),

    /// Operator has no negated counterpart
    #[error("Operator {0} cannot be negated")]
    NotNegatable(String),

    /// Wrong number of values (BETWEEN bounds, multi-row inserts)
    #[error("Invalid arity: {0}")]
    InvalidArity(String),

    /// ORDER BY direction other than `ASC` / `DESC`
    #[error("Invalid sort direction: {0}")]
    InvalidSortDirection(String),

    /// Identifier or select expression rejected by the quoting rules
    #[error("Invalid SQL identifier: {0}")]
    InvalidIdentifier(String),

    /// Operation the dialect cannot express
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Bad argument passed to a builder or the database handle
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Nothing to execute (no operation set and no staged statement)
    #[error("Empty statement")]
    EmptyStatement,

    /// Statement failed on the server
    #[error("Query error: {source} (sql: {sql})")]
    Execution {
        #[source]
        source: DriverError,
        sql: String,
    },

    /// Could not open a connection to an endpoint
    #[error("Connection error ({endpoint}): {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: DriverError,
    },

    /// Invalid or missing configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },
}

impl DbError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an unsupported operation error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation(message.into())
    }

    /// Check if this error came from the server while executing a statement
    pub fn is_execution(&self) -> bool {
        matches!(self, Self::Execution { .. })
    }

    /// Check if this is a connection error
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Check if this error was raised by the builder before anything was sent
    pub fn is_builder_misuse(&self) -> bool {
        matches!(
            self,
            Self::OperationNotAllowed(_)
                | Self::InvalidValueType(_)
                | Self::UnknownOperator(_)
                | Self::NotNegatable(_)
                | Self::InvalidArity(_)
                | Self::InvalidSortDirection(_)
                | Self::InvalidIdentifier(_)
                | Self::UnsupportedOperation(_)
                | Self::InvalidArgument(_)
        )
    }

    /// The driver error tuple, when the failure came from the driver.
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::Execution { source, .. } | Self::Connection { source, .. } => Some(source),
            _ => None,
        }
    }
}
