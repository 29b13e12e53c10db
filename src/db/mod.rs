//! Database access layer.
//!
//! This module provides database access functionality:
//! - Connection setup for each dialect
//! - Query execution
//! - Type mappings

pub mod connector;
pub mod executor;
pub mod types;

pub use connector::{DbHandle, connect};
pub use executor::execute_query;
