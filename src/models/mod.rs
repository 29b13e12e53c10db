//! Data models for sql-export.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod table;

// Re-export commonly used types
pub use connection::{ConnectionDescriptor, DatabaseType, is_truthy, parse_odbc_pairs};
pub use table::{CellValue, ExportSummary, ResultTable};
