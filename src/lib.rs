//! SQL Export Library
//!
//! Runs a single SQL query against SQL Server, PostgreSQL, MySQL, or SQLite
//! and writes the result set to an Excel spreadsheet.

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod prompt;

pub use config::Config;
pub use error::{ExportError, ExportResult};
pub use export::run;
