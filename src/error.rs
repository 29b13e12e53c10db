//! Error types for sql-export.
//!
//! Every fallible step of an export returns an [`ExportError`]. Variants map
//! one-to-one onto the failure classes a user can act on, and the connection
//! and query variants carry a suggestion so the final message tells the user
//! what to check.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unsupported database type: {name} (expected one of sqlserver, postgresql, mysql, sqlite)")]
    UnsupportedDialect { name: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("SQL file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Query failed: {message}")]
    QueryExecution {
        message: String,
        /// SQLSTATE for sqlx backends, error number for SQL Server
        code: Option<String>,
        suggestion: String,
    },

    #[error("Could not create directory {}: {source}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not write spreadsheet: {message}")]
    Serialization { message: String },

    #[error("Invalid input: {message}")]
    Input { message: String },
}

impl ExportError {
    /// Create an unsupported dialect error.
    pub fn unsupported_dialect(name: impl Into<String>) -> Self {
        Self::UnsupportedDialect { name: name.into() }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a missing SQL file error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a query error with an optional server error code.
    pub fn query(
        message: impl Into<String>,
        code: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::QueryExecution {
            message: message.into(),
            code,
            suggestion: suggestion.into(),
        }
    }

    pub fn directory_creation(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreation {
            path: path.into(),
            source,
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::QueryExecution { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Process exit code for a run that ended with this error.
    ///
    /// Errors raised before a database handle exists abort the run with 1.
    /// Connection, query and write errors are reported and the run still
    /// exits with 0.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::UnsupportedDialect { .. }
            | Self::FileNotFound { .. }
            | Self::DirectoryCreation { .. }
            | Self::Input { .. } => 1,
            Self::Connection { .. } | Self::QueryExecution { .. } | Self::Serialization { .. } => 0,
        }
    }
}

/// Convert sqlx errors raised while running a query.
///
/// Connect-time failures are mapped to [`ExportError::Connection`] explicitly
/// by the connector; anything reaching this conversion happened on an open
/// handle.
impl From<sqlx::Error> for ExportError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                ExportError::query(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::Io(io_err) => ExportError::query(
                format!("I/O error: {}", io_err),
                None,
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Protocol(msg) => ExportError::query(
                format!("Protocol error: {}", msg),
                None,
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnDecode { index, source } => ExportError::serialization(format!(
                "Failed to decode column {}: {}",
                index, source
            )),
            sqlx::Error::Decode(source) => {
                ExportError::serialization(format!("Decode error: {}", source))
            }
            sqlx::Error::TypeNotFound { type_name } => {
                ExportError::serialization(format!("Unsupported column type: {}", type_name))
            }
            other => ExportError::query(
                other.to_string(),
                None,
                "Check the SQL and the database server logs",
            ),
        }
    }
}

impl From<tiberius::error::Error> for ExportError {
    fn from(err: tiberius::error::Error) -> Self {
        match err {
            tiberius::error::Error::Server(token) => ExportError::query(
                token.message().to_string(),
                Some(token.code().to_string()),
                "Check the SQL syntax and referenced objects",
            ),
            tiberius::error::Error::Conversion(msg) => {
                ExportError::serialization(format!("Conversion error: {}", msg))
            }
            other => ExportError::query(
                other.to_string(),
                None,
                "Check network connectivity and database server status",
            ),
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for ExportError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ExportError::serialization(err.to_string())
    }
}

/// Result type alias for export operations.
pub type ExportResult<T> = Result<T, ExportError>;
