//! Error types for sqlstore.
//!
//! This module defines all error types using `thiserror`. Every payload is an owned
//! string so a `DbError` is `Send + Sync + 'static` and can travel as a panic payload
//! when fail-fast mode is requested (see [`crate::db::transaction`]).

use thiserror::Error;

/// Broad category of a [`DbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid or incomplete store configuration.
    Configuration,
    /// A statement, dataset, store, driver or dialect could not be resolved.
    Resolution,
    /// SQL text could not be generated from an entity descriptor.
    Synthesis,
    /// The underlying driver failed while executing, fetching or scanning.
    Execution,
    /// A result set could not be rendered into the requested output shape.
    Materialization,
    /// Transaction begin/commit/rollback failure or a rolled back body.
    Transaction,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Timeout: {operation}")]
    Timeout { operation: String },

    #[error("Missing dataset when referencing a statement key")]
    MissingDataset,

    #[error("Unable to find statement for {entity}: {key}")]
    StatementNotFound { entity: String, key: String },

    #[error("Unsupported {what}: {name}")]
    Unsupported { what: String, name: String },

    #[error("Invalid identity field '{field}': {reason}")]
    InvalidIdentity { field: String, reason: String },

    #[error("Column error: {message}")]
    Column { message: String },

    #[error("Unsupported output type for column '{column}': {type_name}")]
    UnsupportedOutputType { column: String, type_name: String },

    #[error("Output error: {message}")]
    Output { message: String },

    #[error("Transaction error: {message}")]
    Transaction { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("{message}")]
    Aborted { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Create a statement-not-found error.
    pub fn statement_not_found(entity: impl Into<String>, key: impl Into<String>) -> Self {
        Self::StatementNotFound {
            entity: entity.into(),
            key: key.into(),
        }
    }

    /// Create an unsupported store/driver/dialect/feature error.
    pub fn unsupported(what: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Unsupported {
            what: what.into(),
            name: name.into(),
        }
    }

    /// Create an invalid identity field error.
    pub fn invalid_identity(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentity {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a column introspection error.
    pub fn column(message: impl Into<String>) -> Self {
        Self::Column {
            message: message.into(),
        }
    }

    /// Create an unsupported output type error.
    pub fn unsupported_output_type(
        column: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self::UnsupportedOutputType {
            column: column.into(),
            type_name: type_name.into(),
        }
    }

    /// Create an output rendering error.
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Create a transaction error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an error carrying a caller-raised failure message verbatim.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::MissingDataset | Self::StatementNotFound { .. } | Self::Unsupported { .. } => {
                ErrorKind::Resolution
            }
            Self::InvalidIdentity { .. } | Self::InvalidInput { .. } => ErrorKind::Synthesis,
            Self::Column { .. } | Self::UnsupportedOutputType { .. } | Self::Output { .. } => {
                ErrorKind::Materialization
            }
            Self::Transaction { .. } | Self::Aborted { .. } => ErrorKind::Transaction,
            Self::Connection { .. }
            | Self::Database { .. }
            | Self::Timeout { .. }
            | Self::Internal { .. } => ErrorKind::Execution,
        }
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => DbError::timeout("connection pool acquire"),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::TypeNotFound { type_name } => {
                DbError::column(format!("Type not found: {}", type_name))
            }
            sqlx::Error::ColumnNotFound(col) => {
                DbError::column(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::column(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => DbError::database(
                format!("Failed to scan column {}: {}", index, source),
                None,
                "Check that the destination type matches the column type",
            ),
            sqlx::Error::Decode(source) => DbError::database(
                format!("Decode error: {}", source),
                None,
                "Check that the destination type matches the column type",
            ),
            sqlx::Error::AnyDriverError(err) => DbError::connection(
                format!("Driver error: {}", err),
                "Check database driver configuration",
            ),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = DbError::database(
            "Syntax error",
            Some("42601".to_string()),
            "Check SQL syntax",
        );
        assert_eq!(err.suggestion(), Some("Check SQL syntax"));
        assert_eq!(DbError::MissingDataset.suggestion(), None);
    }

    #[test]
    fn test_statement_not_found_message() {
        let err = DbError::statement_not_found("public.fishing_spots", "by_location");
        assert_eq!(
            err.to_string(),
            "Unable to find statement for public.fishing_spots: by_location"
        );
    }

    #[test]
    fn test_aborted_keeps_message_verbatim() {
        let err = DbError::aborted("boom");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(DbError::MissingDataset.kind(), ErrorKind::Resolution);
        assert_eq!(
            DbError::unsupported("dialect", "db2").kind(),
            ErrorKind::Resolution
        );
        assert_eq!(
            DbError::invalid_identity("id", "missing sequence").kind(),
            ErrorKind::Synthesis
        );
        assert_eq!(
            DbError::unsupported_output_type("flag", "BOOLEAN").kind(),
            ErrorKind::Materialization
        );
        assert_eq!(DbError::timeout("query").kind(), ErrorKind::Execution);
        assert_eq!(
            DbError::from(sqlx::Error::RowNotFound).kind(),
            ErrorKind::Execution
        );
    }

    #[test]
    fn test_sqlx_pool_timeout_maps_to_timeout() {
        let err = DbError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DbError::Timeout { .. }));
    }
}
