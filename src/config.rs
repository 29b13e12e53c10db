//! Configuration handling for sql-export.
//!
//! All settings come from environment variables (optionally loaded from an env
//! file first) or the equivalent command-line flags. The result is a single
//! [`Config`] value built once at startup; nothing downstream reads the
//! environment again.

use clap::{Args, Parser};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Env file loaded before parsing when `EXPORT_ENV_FILE` is not set.
pub const DEFAULT_ENV_FILE: &str = "conn.env";

/// Environment variable that overrides the env file location.
pub const ENV_FILE_VAR: &str = "EXPORT_ENV_FILE";

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Connection settings for every supported dialect.
///
/// Only the fields of the selected dialect are used. Values are passed through
/// verbatim; missing ones only surface as errors when the connection is opened.
#[derive(Debug, Clone, Default, Args, Serialize)]
pub struct DatabaseSettings {
    /// ODBC driver name (SQL Server), e.g. "ODBC Driver 17 for SQL Server"
    #[arg(long = "db-driver", env = "DB_DRIVER")]
    pub driver: Option<String>,

    /// Server host, optionally "host,port" or "host\instance" (SQL Server)
    #[arg(long = "db-server", env = "DB_SERVER")]
    pub server: Option<String>,

    /// Database name (SQL Server)
    #[arg(long = "db-database", env = "DB_DATABASE")]
    pub database: Option<String>,

    /// Trusted connection flag, e.g. "yes" (SQL Server)
    #[arg(long = "db-trusted-connection", env = "DB_TRUSTED_CONNECTION")]
    pub trusted_connection: Option<String>,

    /// User name (PostgreSQL, MySQL, SQL Server authentication)
    #[arg(long = "db-user", env = "DB_USER")]
    pub user: Option<String>,

    /// Password (PostgreSQL, MySQL, SQL Server authentication)
    #[serde(skip_serializing)]
    #[arg(long = "db-pass", env = "DB_PASS", hide_env_values = true)]
    pub password: Option<String>,

    /// Host, optionally with ":port" (PostgreSQL, MySQL)
    #[arg(long = "db-host", env = "DB_HOST")]
    pub host: Option<String>,

    /// Database name (PostgreSQL, MySQL)
    #[arg(long = "db-name", env = "DB_NAME")]
    pub name: Option<String>,

    /// Database file path (SQLite)
    #[arg(long = "db-path", env = "DB_PATH")]
    pub path: Option<String>,
}

impl DatabaseSettings {
    /// JSON dump of the settings for logging, without the password.
    pub fn redacted(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Configuration for one export run.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sql-export",
    about = "Run a SQL query and export the result to an Excel spreadsheet",
    version
)]
pub struct Config {
    /// Database type (sqlserver, postgresql, mysql, sqlite). Prompted if absent.
    #[arg(long = "db-type", value_name = "TYPE", env = "DB_TYPE")]
    pub db_type: Option<String>,

    /// File containing the SQL query. Prompted if absent.
    #[arg(long = "sql-file", value_name = "PATH", env = "SQL_FILE_PATH")]
    pub sql_file: Option<PathBuf>,

    /// Output spreadsheet path. Prompted if absent.
    #[arg(long = "excel-file", value_name = "PATH", env = "EXCEL_FILE_PATH")]
    pub excel_file: Option<PathBuf>,

    #[command(flatten)]
    pub database: DatabaseSettings,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "EXPORT_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "EXPORT_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Load the env file (if any) and parse the configuration.
    ///
    /// Returns the outcome of the env file load alongside the config so the
    /// caller can report it once logging is up.
    pub fn load() -> (Self, EnvFileStatus) {
        let status = load_env_file(&env_file_path());
        (Self::parse(), status)
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            db_type: None,
            sql_file: None,
            excel_file: None,
            database: DatabaseSettings::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
        }
    }

    /// Configured database type, if non-empty.
    pub fn db_type(&self) -> Option<&str> {
        non_empty(self.db_type.as_deref())
    }

    /// Configured SQL file path, if non-empty.
    pub fn sql_file(&self) -> Option<&Path> {
        non_empty_path(self.sql_file.as_deref())
    }

    /// Configured output path, if non-empty.
    pub fn excel_file(&self) -> Option<&Path> {
        non_empty_path(self.excel_file.as_deref())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Result of trying to load the env file.
#[derive(Debug)]
pub enum EnvFileStatus {
    Loaded(PathBuf),
    Missing(PathBuf),
    Invalid(PathBuf, dotenvy::Error),
}

/// Location of the env file: `$EXPORT_ENV_FILE` or `conn.env`.
pub fn env_file_path() -> PathBuf {
    std::env::var_os(ENV_FILE_VAR)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE))
}

/// Load variables from an env file. Variables already set in the process
/// environment are left untouched.
pub fn load_env_file(path: &Path) -> EnvFileStatus {
    match dotenvy::from_path(path) {
        Ok(()) => EnvFileStatus::Loaded(path.to_path_buf()),
        Err(e) if e.not_found() => EnvFileStatus::Missing(path.to_path_buf()),
        Err(e) => EnvFileStatus::Invalid(path.to_path_buf(), e),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn non_empty_path(value: Option<&Path>) -> Option<&Path> {
    value.filter(|p| !p.as_os_str().is_empty())
}
