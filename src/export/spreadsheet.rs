//! Spreadsheet output.
//!
//! Writes a [`ResultTable`] to a single-sheet `.xlsx` workbook: a header row
//! of column names followed by one row per record, in result order.

use crate::error::{ExportError, ExportResult};
use crate::models::{CellValue, ExportSummary, ResultTable};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::path::Path;
use tracing::debug;

const DATE_FORMAT: &str = "yyyy-mm-dd";
const TIME_FORMAT: &str = "hh:mm:ss";
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Create the parent directory of `path` if it is missing.
///
/// A bare file name has no parent to create.
pub async fn ensure_parent_dir(path: &Path) -> ExportResult<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if tokio::fs::try_exists(parent).await.unwrap_or(false) {
        return Ok(());
    }

    debug!(dir = %parent.display(), "Creating output directory");
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| ExportError::directory_creation(parent, e))
}

/// Serializes result tables to `.xlsx`.
pub struct SpreadsheetWriter {
    date: Format,
    time: Format,
    datetime: Format,
}

impl SpreadsheetWriter {
    pub fn new() -> Self {
        Self {
            date: Format::new().set_num_format(DATE_FORMAT),
            time: Format::new().set_num_format(TIME_FORMAT),
            datetime: Format::new().set_num_format(DATETIME_FORMAT),
        }
    }

    /// Write `table` to `path`, replacing any existing file.
    pub fn write(&self, table: &ResultTable, path: &Path) -> ExportResult<ExportSummary> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        for (col, name) in table.columns.iter().enumerate() {
            worksheet.write_string(0, column_index(col)?, name)?;
        }

        for (idx, row) in table.rows.iter().enumerate() {
            let row_num = u32::try_from(idx + 1).map_err(|_| {
                ExportError::serialization(format!("Too many rows: {}", table.row_count()))
            })?;
            for (col, value) in row.iter().enumerate() {
                self.write_cell(worksheet, row_num, column_index(col)?, value)?;
            }
        }

        workbook.save(path)?;
        debug!(
            path = %path.display(),
            rows = table.row_count(),
            columns = table.column_count(),
            "Workbook saved"
        );

        Ok(ExportSummary {
            path: path.to_path_buf(),
            rows: table.row_count(),
            columns: table.column_count(),
        })
    }

    fn write_cell(
        &self,
        worksheet: &mut Worksheet,
        row: u32,
        col: u16,
        value: &CellValue,
    ) -> ExportResult<()> {
        match value {
            CellValue::Null => {}
            CellValue::Bool(v) => {
                worksheet.write_boolean(row, col, *v)?;
            }
            CellValue::Int(v) => {
                worksheet.write_number(row, col, *v as f64)?;
            }
            CellValue::Float(v) if v.is_finite() => {
                worksheet.write_number(row, col, *v)?;
            }
            CellValue::Float(v) => {
                worksheet.write_string(row, col, v.to_string())?;
            }
            CellValue::Text(v) => {
                worksheet.write_string(row, col, v)?;
            }
            CellValue::Date(v) => {
                worksheet.write_datetime_with_format(row, col, v, &self.date)?;
            }
            CellValue::Time(v) => {
                worksheet.write_datetime_with_format(row, col, v, &self.time)?;
            }
            CellValue::DateTime(v) => {
                worksheet.write_datetime_with_format(row, col, v, &self.datetime)?;
            }
        }
        Ok(())
    }
}

impl Default for SpreadsheetWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn column_index(col: usize) -> ExportResult<u16> {
    u16::try_from(col).map_err(|_| ExportError::serialization(format!("Too many columns: {}", col + 1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{Data, Reader, Xlsx, open_workbook};
    use chrono::NaiveDate;

    fn read_back(path: &Path) -> Vec<Vec<Data>> {
        let mut workbook: Xlsx<_> = open_workbook(path).unwrap();
        let range = workbook.worksheet_range_at(0).unwrap().unwrap();
        range.rows().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn test_write_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");

        let mut table = ResultTable::new(vec!["id".into(), "name".into(), "active".into()]);
        table.push_row(vec![CellValue::Int(1), "a".into(), CellValue::Bool(true)]);
        table.push_row(vec![CellValue::Int(2), CellValue::Null, CellValue::Bool(false)]);

        let summary = SpreadsheetWriter::new().write(&table, &path).unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.columns, 3);

        let rows = read_back(&path);
        assert_eq!(
            rows[0],
            vec![
                Data::String("id".into()),
                Data::String("name".into()),
                Data::String("active".into())
            ]
        );
        assert_eq!(rows[1][0], Data::Float(1.0));
        assert_eq!(rows[1][1], Data::String("a".into()));
        assert_eq!(rows[1][2], Data::Bool(true));
        assert_eq!(rows[2][1], Data::Empty);
    }

    #[test]
    fn test_write_empty_table_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");
        let table = ResultTable::new(vec!["id".into(), "name".into()]);

        SpreadsheetWriter::new().write(&table, &path).unwrap();
        let rows = read_back(&path);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], vec![Data::String("id".into()), Data::String("name".into())]);
    }

    #[test]
    fn test_write_dates_as_excel_dates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dates.xlsx");
        let mut table = ResultTable::new(vec!["day".into()]);
        table.push_row(vec![CellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap())]);

        SpreadsheetWriter::new().write(&table, &path).unwrap();
        let rows = read_back(&path);
        assert!(matches!(rows[1][0], Data::DateTime(_)));
    }

    #[test]
    fn test_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        std::fs::write(&path, b"not a workbook").unwrap();

        let table = ResultTable::new(vec!["x".into()]);
        SpreadsheetWriter::new().write(&table, &path).unwrap();
        assert_eq!(read_back(&path)[0], vec![Data::String("x".into())]);
    }

    #[test]
    fn test_unwritable_target_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.xlsx");
        let err = SpreadsheetWriter::new()
            .write(&ResultTable::new(vec!["x".into()]), &path)
            .unwrap_err();
        assert!(matches!(err, ExportError::Serialization { .. }));
    }

    #[tokio::test]
    async fn test_ensure_parent_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("out.xlsx");
        ensure_parent_dir(&path).await.unwrap();
        assert!(dir.path().join("a").join("b").is_dir());
        // existing directory is fine
        ensure_parent_dir(&path).await.unwrap();
        ensure_parent_dir(Path::new("out.xlsx")).await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_parent_dir_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        let err = ensure_parent_dir(&blocker.join("sub").join("out.xlsx"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::DirectoryCreation { .. }));
        assert_eq!(err.exit_code(), 1);
    }
}
