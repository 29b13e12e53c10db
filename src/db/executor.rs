//! Query execution.
//!
//! Runs one SQL text against an open [`DbHandle`] and materializes the whole
//! result set as a [`ResultTable`].
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`, `postgres`, `sqlite`: sqlx connections, rows decoded via [`RowToCells`]
//! - `mssql`: tiberius client, rows decoded from `ColumnData`
//!
//! The SQL is sent as-is without preparation or parameters, so scripts that
//! cannot be prepared (procedure calls, vendor syntax) still run.

use crate::db::connector::DbHandle;
use crate::db::types::RowToCells;
use crate::error::ExportResult;
use crate::models::ResultTable;
use futures_util::TryStreamExt;
use futures_util::stream::BoxStream;
use sqlx::Either;
use std::time::Instant;
use tracing::debug;

/// Execute `sql` and collect every row of the first result set.
///
/// For scripts with several statements, that is the first statement that
/// returns rows (sqlx) or the first result set the server reports
/// (SQL Server). A query that yields no rows still reports its column names when the
/// database can describe them; otherwise the table has no columns.
pub async fn execute_query(handle: &mut DbHandle, sql: &str) -> ExportResult<ResultTable> {
    let start = Instant::now();
    debug!(db_type = %handle.db_type(), sql_len = sql.len(), "Executing query");

    let table = match handle {
        DbHandle::MySql(conn) => mysql::fetch_table(conn, sql).await?,
        DbHandle::Postgres(conn) => postgres::fetch_table(conn, sql).await?,
        DbHandle::SQLite(conn) => sqlite::fetch_table(conn, sql).await?,
        DbHandle::SqlServer(client) => mssql::fetch_table(client, sql).await?,
    };

    debug!(
        rows = table.row_count(),
        columns = table.column_count(),
        execution_time_ms = start.elapsed().as_millis() as u64,
        "Query completed"
    );
    Ok(table)
}

/// Rows of the first statement that returns any.
///
/// Later statements still run to completion so their errors surface, but
/// their rows are dropped.
async fn first_result_set<Q, R>(
    mut stream: BoxStream<'_, Result<Either<Q, R>, sqlx::Error>>,
) -> ExportResult<Vec<R>> {
    let mut rows = Vec::new();
    let mut complete = false;
    let mut ignored = 0usize;
    while let Some(item) = stream.try_next().await? {
        match item {
            Either::Right(row) if !complete => rows.push(row),
            Either::Right(_) => ignored += 1,
            Either::Left(_) => complete = !rows.is_empty(),
        }
    }
    if ignored > 0 {
        debug!(ignored, "Dropped rows of later result sets");
    }
    Ok(rows)
}

/// Build a table from decoded sqlx rows. `columns` is used only when there are no rows.
fn rows_to_table<R: RowToCells>(rows: Vec<R>, columns: Vec<String>) -> ExportResult<ResultTable> {
    let Some(first) = rows.first() else {
        return Ok(ResultTable::new(columns));
    };

    let mut table = ResultTable::new(first.column_names());
    for row in &rows {
        table.push_row(row.to_cells()?);
    }
    Ok(table)
}

fn statement_columns<'q, S: sqlx::Statement<'q>>(statement: &S) -> Vec<String> {
    use sqlx::Column;
    statement
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect()
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// The sqlx modules below differ only in their connection type.

mod mysql {
    use super::*;
    use sqlx::{Executor, MySqlConnection};

    pub async fn fetch_table(conn: &mut MySqlConnection, sql: &str) -> ExportResult<ResultTable> {
        let rows = first_result_set((&mut *conn).fetch_many(sql)).await?;
        let columns = if rows.is_empty() {
            describe(conn, sql).await
        } else {
            Vec::new()
        };
        rows_to_table(rows, columns)
    }

    async fn describe(conn: &mut MySqlConnection, sql: &str) -> Vec<String> {
        match conn.prepare(sql).await {
            Ok(statement) => statement_columns(&statement),
            Err(e) => {
                debug!(error = %e, "Could not describe empty result");
                Vec::new()
            }
        }
    }
}

mod postgres {
    use super::*;
    use sqlx::{Executor, PgConnection};

    pub async fn fetch_table(conn: &mut PgConnection, sql: &str) -> ExportResult<ResultTable> {
        let rows = first_result_set((&mut *conn).fetch_many(sql)).await?;
        let columns = if rows.is_empty() {
            describe(conn, sql).await
        } else {
            Vec::new()
        };
        rows_to_table(rows, columns)
    }

    async fn describe(conn: &mut PgConnection, sql: &str) -> Vec<String> {
        match conn.prepare(sql).await {
            Ok(statement) => statement_columns(&statement),
            Err(e) => {
                debug!(error = %e, "Could not describe empty result");
                Vec::new()
            }
        }
    }
}

mod sqlite {
    use super::*;
    use sqlx::{Executor, SqliteConnection};

    pub async fn fetch_table(conn: &mut SqliteConnection, sql: &str) -> ExportResult<ResultTable> {
        let rows = first_result_set((&mut *conn).fetch_many(sql)).await?;
        let columns = if rows.is_empty() {
            describe(conn, sql).await
        } else {
            Vec::new()
        };
        rows_to_table(rows, columns)
    }

    async fn describe(conn: &mut SqliteConnection, sql: &str) -> Vec<String> {
        match conn.prepare(sql).await {
            Ok(statement) => statement_columns(&statement),
            Err(e) => {
                debug!(error = %e, "Could not describe empty result");
                Vec::new()
            }
        }
    }
}

mod mssql {
    use super::*;
    use crate::db::connector::MssqlClient;
    use crate::db::types::mssql::row_to_cells;

    pub async fn fetch_table(client: &mut MssqlClient, sql: &str) -> ExportResult<ResultTable> {
        let mut stream = client.simple_query(sql).await?;
        let columns: Vec<String> = stream
            .columns()
            .await?
            .map(|cols| cols.iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let mut table = ResultTable::new(columns);
        for row in stream.into_first_result().await? {
            table.push_row(row_to_cells(row)?);
        }
        Ok(table)
    }
}
