//! Query result data models.
//!
//! A [`ResultTable`] is the fully materialized output of one query: the column
//! names in result-set order plus every row, each a vector of scalar
//! [`CellValue`]s aligned with the columns.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::path::PathBuf;

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl From<Option<i64>> for CellValue {
    fn from(value: Option<i64>) -> Self {
        value.map(CellValue::Int).unwrap_or(CellValue::Null)
    }
}

impl From<Option<f64>> for CellValue {
    fn from(value: Option<f64>) -> Self {
        value.map(CellValue::Float).unwrap_or(CellValue::Null)
    }
}

impl From<Option<bool>> for CellValue {
    fn from(value: Option<bool>) -> Self {
        value.map(CellValue::Bool).unwrap_or(CellValue::Null)
    }
}

impl From<Option<String>> for CellValue {
    fn from(value: Option<String>) -> Self {
        value.map(CellValue::Text).unwrap_or(CellValue::Null)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

/// In-memory query result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl ResultTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row. Its length must match the column count.
    pub fn push_row(&mut self, row: Vec<CellValue>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What a successful export produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultTable {
        let mut table = ResultTable::new(vec!["id".to_string(), "name".to_string()]);
        table.push_row(vec![CellValue::Int(1), "a".into()]);
        table.push_row(vec![CellValue::Int(2), CellValue::Null]);
        table
    }

    #[test]
    fn test_table_shape() {
        let table = sample();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_count(), 2);
        assert!(!table.is_empty());
        assert!(ResultTable::new(vec!["x".to_string()]).is_empty());
    }

    #[test]
    fn test_cell_value_from_option() {
        assert_eq!(CellValue::from(Some(3_i64)), CellValue::Int(3));
        assert_eq!(CellValue::from(None::<i64>), CellValue::Null);
        assert_eq!(CellValue::from(Some(true)), CellValue::Bool(true));
        assert_eq!(CellValue::from(None::<String>), CellValue::Null);
    }
}
