//! Database-agnostic type mappings.
//!
//! This module maps database-specific column values onto [`CellValue`].
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! Queries are sent unprepared, so PostgreSQL and MySQL return values in their
//! text format. Anything a typed decoder does not handle falls back to that
//! text; only values that cannot be read even as text are rejected.
//! SQLite decodes by the runtime storage class of each value instead of the
//! declared column type.

use crate::error::{ExportError, ExportResult};
use crate::models::{CellValue, DatabaseType};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Date,
    Time,
    DateTime,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    // Date/time types before integers: "interval" and "point" contain "int"
    if lower == "date" {
        return TypeCategory::Date;
    }
    if lower == "time" {
        return TypeCategory::Time;
    }
    if lower.starts_with("timestamp") || lower == "datetime" {
        return TypeCategory::DateTime;
    }
    if lower.contains("interval") || lower.contains("point") {
        return TypeCategory::Unknown;
    }

    // Integer types
    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    // Boolean
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    // Float types
    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    // JSON types
    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    // UUID (PostgreSQL)
    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    // Binary types
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower == "name" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Exact decimals become numbers when they fit an `f64`, text otherwise.
pub fn decimal_cell(raw: &str) -> CellValue {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => CellValue::Float(v),
        _ => CellValue::Text(raw.to_string()),
    }
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// Binary data is written as UTF-8 text when valid, base64 otherwise.
pub fn decode_binary_value(bytes: &[u8]) -> CellValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => CellValue::Text(s.to_string()),
        Err(_) => CellValue::Text(STANDARD.encode(bytes)),
    }
}

fn unsigned_cell(v: u64) -> CellValue {
    i64::try_from(v)
        .map(CellValue::Int)
        .unwrap_or(CellValue::Float(v as f64))
}

fn json_cell(v: serde_json::Value) -> CellValue {
    match v {
        serde_json::Value::String(s) => CellValue::Text(s),
        other => CellValue::Text(other.to_string()),
    }
}

// =============================================================================
// Row to Cells Trait
// =============================================================================

/// Trait for converting database rows to result-table cells.
pub trait RowToCells {
    fn column_names(&self) -> Vec<String>;
    fn to_cells(&self) -> ExportResult<Vec<CellValue>>;
}

impl RowToCells for MySqlRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_cells(&self) -> ExportResult<Vec<CellValue>> {
        decode_columns(self, DatabaseType::MySQL, mysql::decode_column)
    }
}

impl RowToCells for PgRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_cells(&self) -> ExportResult<Vec<CellValue>> {
        decode_columns(self, DatabaseType::PostgreSQL, postgres::decode_column)
    }
}

impl RowToCells for SqliteRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_cells(&self) -> ExportResult<Vec<CellValue>> {
        decode_columns(self, DatabaseType::SQLite, sqlite::decode_column)
    }
}

/// Decode every column of a row: NULL check, typed decoder, then text fallback.
fn decode_columns<R>(
    row: &R,
    db: DatabaseType,
    decode: fn(&R, usize, TypeCategory) -> Option<CellValue>,
) -> ExportResult<Vec<CellValue>>
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'a> String: Decode<'a, R::Database>,
    String: Type<R::Database>,
{
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let type_name = col.type_info().name();
            if row.try_get_raw(idx).is_ok_and(|v| v.is_null()) {
                return Ok(CellValue::Null);
            }
            let category = categorize_type(type_name, db);
            decode(row, idx, category)
                .or_else(|| unchecked(row, idx, CellValue::Text))
                .ok_or_else(|| {
                    ExportError::serialization(format!(
                        "Unsupported column type {} in column '{}'",
                        type_name,
                        col.name()
                    ))
                })
        })
        .collect()
}

/// Decode a column as `T`, with type checking. `None` if `T` does not fit.
fn cell<'r, R, T>(row: &'r R, idx: usize, map: impl FnOnce(T) -> CellValue) -> Option<CellValue>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    match row.try_get::<Option<T>, _>(idx) {
        Ok(Some(v)) => Some(map(v)),
        Ok(None) => Some(CellValue::Null),
        Err(_) => None,
    }
}

/// Decode a column as `T` without checking the column type.
fn unchecked<'r, R, T>(
    row: &'r R,
    idx: usize,
    map: impl FnOnce(T) -> CellValue,
) -> Option<CellValue>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    match row.try_get_unchecked::<Option<T>, _>(idx) {
        Ok(Some(v)) => Some(map(v)),
        Ok(None) => Some(CellValue::Null),
        Err(_) => None,
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> Option<CellValue> {
        match category {
            TypeCategory::Decimal => cell(row, idx, |v: RawDecimal| decimal_cell(&v.0)),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => cell(row, idx, CellValue::Bool)
                .or_else(|| decode_integer(row, idx)),
            TypeCategory::Float => cell(row, idx, CellValue::Float)
                .or_else(|| cell(row, idx, |v: f32| CellValue::Float(v.into()))),
            TypeCategory::Binary => cell(row, idx, |v: Vec<u8>| decode_binary_value(&v)),
            TypeCategory::Json => cell(row, idx, json_cell),
            TypeCategory::Date => cell(row, idx, CellValue::Date),
            TypeCategory::Time => cell(row, idx, CellValue::Time),
            TypeCategory::DateTime => cell(row, idx, CellValue::DateTime).or_else(|| {
                cell(row, idx, |v: DateTime<Utc>| CellValue::DateTime(v.naive_utc()))
            }),
            _ => cell(row, idx, CellValue::Text),
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Option<CellValue> {
        cell(row, idx, |v: i8| CellValue::Int(v.into()))
            .or_else(|| cell(row, idx, |v: i16| CellValue::Int(v.into())))
            .or_else(|| cell(row, idx, |v: i32| CellValue::Int(v.into())))
            .or_else(|| cell(row, idx, CellValue::Int))
            .or_else(|| cell(row, idx, |v: u8| CellValue::Int(v.into())))
            .or_else(|| cell(row, idx, |v: u16| CellValue::Int(v.into())))
            .or_else(|| cell(row, idx, |v: u32| CellValue::Int(v.into())))
            .or_else(|| cell(row, idx, unsigned_cell))
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> Option<CellValue> {
        match category {
            TypeCategory::Decimal => cell(row, idx, |v: RawDecimal| decimal_cell(&v.0)),
            TypeCategory::Integer => cell(row, idx, |v: i16| CellValue::Int(v.into()))
                .or_else(|| cell(row, idx, |v: i32| CellValue::Int(v.into())))
                .or_else(|| cell(row, idx, CellValue::Int)),
            TypeCategory::Boolean => cell(row, idx, CellValue::Bool),
            TypeCategory::Float => cell(row, idx, CellValue::Float)
                .or_else(|| cell(row, idx, |v: f32| CellValue::Float(v.into()))),
            TypeCategory::Binary => cell(row, idx, |v: Vec<u8>| decode_binary_value(&v)),
            TypeCategory::Json => cell(row, idx, json_cell),
            TypeCategory::Uuid => cell(row, idx, |v: uuid::Uuid| CellValue::Text(v.to_string())),
            TypeCategory::Date => cell(row, idx, |v: NaiveDate| CellValue::Date(v)),
            TypeCategory::Time => cell(row, idx, |v: NaiveTime| CellValue::Time(v)),
            TypeCategory::DateTime => cell(row, idx, |v: NaiveDateTime| CellValue::DateTime(v))
                .or_else(|| {
                    cell(row, idx, |v: DateTime<Utc>| CellValue::DateTime(v.naive_utc()))
                }),
            _ => cell(row, idx, CellValue::Text),
        }
    }
}

mod sqlite {
    use super::*;

    /// SQLite is dynamically typed; decode by the value's storage class.
    pub fn decode_column(
        row: &SqliteRow,
        idx: usize,
        _category: TypeCategory,
    ) -> Option<CellValue> {
        let storage = row.try_get_raw(idx).ok()?.type_info().name().to_string();
        match storage.as_str() {
            "INTEGER" | "BOOLEAN" => unchecked(row, idx, CellValue::Int),
            "REAL" => unchecked(row, idx, CellValue::Float),
            "BLOB" => unchecked(row, idx, |v: Vec<u8>| decode_binary_value(&v)),
            _ => unchecked(row, idx, CellValue::Text),
        }
    }
}

pub mod mssql {
    //! SQL Server values arrive as `tiberius::ColumnData`.

    use super::*;
    use tiberius::{ColumnData, FromSql, Row};

    /// Convert one row into cells, consuming it.
    pub fn row_to_cells(row: Row) -> ExportResult<Vec<CellValue>> {
        let names: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
        row.into_iter()
            .zip(names)
            .map(|(data, name)| column_data_to_cell(data, &name))
            .collect()
    }

    pub fn column_data_to_cell(data: ColumnData<'static>, column: &str) -> ExportResult<CellValue> {
        let cell = match data {
            ColumnData::U8(v) => v.map(i64::from).into(),
            ColumnData::I16(v) => v.map(i64::from).into(),
            ColumnData::I32(v) => v.map(i64::from).into(),
            ColumnData::I64(v) => v.into(),
            ColumnData::F32(v) => v.map(f64::from).into(),
            ColumnData::F64(v) => v.into(),
            ColumnData::Bit(v) => v.into(),
            ColumnData::String(v) => v.map(|s| s.into_owned()).into(),
            ColumnData::Guid(v) => v.map(|g| g.to_string()).into(),
            ColumnData::Binary(v) => v
                .map(|b| decode_binary_value(&b))
                .unwrap_or(CellValue::Null),
            ColumnData::Numeric(v) => v
                .map(|n| {
                    let value = n.value() as f64 / 10f64.powi(n.scale() as i32);
                    if value.is_finite() {
                        CellValue::Float(value)
                    } else {
                        CellValue::Text(n.to_string())
                    }
                })
                .unwrap_or(CellValue::Null),
            ColumnData::Xml(v) => v.map(|x| x.into_owned().into_string()).into(),
            ref data @ (ColumnData::DateTime(_)
            | ColumnData::SmallDateTime(_)
            | ColumnData::DateTime2(_)) => {
                from_sql::<NaiveDateTime>(data, column)?.map_or(CellValue::Null, CellValue::DateTime)
            }
            ref data @ ColumnData::DateTimeOffset(_) => from_sql::<DateTime<Utc>>(data, column)?
                .map_or(CellValue::Null, |v| CellValue::DateTime(v.naive_utc())),
            ref data @ ColumnData::Date(_) => {
                from_sql::<NaiveDate>(data, column)?.map_or(CellValue::Null, CellValue::Date)
            }
            ref data @ ColumnData::Time(_) => {
                from_sql::<NaiveTime>(data, column)?.map_or(CellValue::Null, CellValue::Time)
            }
        };
        Ok(cell)
    }

    fn from_sql<'a, T>(data: &'a ColumnData<'static>, column: &str) -> ExportResult<Option<T>>
    where
        T: FromSql<'a>,
    {
        T::from_sql(data).map_err(|e| {
            ExportError::serialization(format!("Failed to decode column '{}': {}", column, e))
        })
    }
}
