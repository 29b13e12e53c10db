//! Export orchestration.
//!
//! One run resolves the dialect and both paths, opens a connection, and then
//! runs the query and writes the spreadsheet inside [`with_handle`] so the
//! connection is always disposed.
//!
//! Failures before a connection exists (unknown dialect, missing SQL file,
//! uncreatable output directory) abort the run; see [`ExportError::exit_code`]
//! for how outcomes map to process exit codes.

pub mod guard;
pub mod spreadsheet;

pub use guard::{Dispose, PhaseTracker, RunPhase, with_handle};
pub use spreadsheet::{SpreadsheetWriter, ensure_parent_dir};

use crate::config::Config;
use crate::db::{self, DbHandle};
use crate::error::{ExportError, ExportResult};
use crate::models::{ConnectionDescriptor, DatabaseType, ExportSummary};
use crate::prompt::{BANNER, DB_TYPE_PROMPT, EXCEL_FILE_PROMPT, Prompter, SQL_FILE_PROMPT};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Run one export. Values missing from `config` are asked for via `prompter`.
///
/// Errors are logged with the phase they happened in before being returned.
pub async fn run<R: BufRead, W: Write>(
    config: Config,
    prompter: &mut Prompter<R, W>,
) -> ExportResult<ExportSummary> {
    let mut phases = PhaseTracker::new();
    let result = export(config, prompter, &mut phases).await;
    if let Err(e) = &result {
        error!(
            phase = %phases.current(),
            error = %e,
            suggestion = e.suggestion().unwrap_or_default(),
            "Export failed"
        );
    }
    result
}

async fn export<R: BufRead, W: Write>(
    config: Config,
    prompter: &mut Prompter<R, W>,
    phases: &mut PhaseTracker,
) -> ExportResult<ExportSummary> {
    prompter.say(BANNER)?;

    let db_type: DatabaseType = prompter
        .choose_value(config.db_type(), DB_TYPE_PROMPT)?
        .parse()?;

    let sql_file = resolve_path(prompter, config.sql_file(), SQL_FILE_PROMPT)?;
    if !is_file(&sql_file).await {
        return Err(ExportError::file_not_found(sql_file));
    }

    let excel_file = resolve_path(prompter, config.excel_file(), EXCEL_FILE_PROMPT)?;
    ensure_parent_dir(&excel_file).await?;

    debug!(
        db_type = %db_type,
        settings = %config.database.redacted(),
        "Resolved connection settings"
    );
    let descriptor = ConnectionDescriptor::from_settings(db_type, config.database);
    let handle = db::connect(descriptor).await?;
    phases.advance(RunPhase::Connected);

    let summary = with_handle(handle, async |handle: &mut DbHandle| {
        phases.advance(RunPhase::Querying);
        let sql = read_sql_file(&sql_file).await?;
        let table = db::execute_query(handle, &sql).await?;

        phases.advance(RunPhase::Writing);
        let summary = SpreadsheetWriter::new().write(&table, &excel_file)?;
        info!(
            rows = summary.rows,
            columns = summary.columns,
            "Data exported successfully to {}",
            summary.path.display()
        );
        Ok(summary)
    })
    .await?;

    phases.advance(RunPhase::Closed);
    Ok(summary)
}

/// Read the query text verbatim.
pub async fn read_sql_file(path: &Path) -> ExportResult<String> {
    if !is_file(path).await {
        return Err(ExportError::file_not_found(path));
    }
    let sql = tokio::fs::read_to_string(path).await.map_err(|e| {
        ExportError::query(
            format!("Could not read {}: {}", path.display(), e),
            None,
            "Make sure the SQL file is readable UTF-8 text",
        )
    })?;
    debug!(path = %path.display(), sql = %sql, "Loaded SQL");
    Ok(sql)
}

fn resolve_path<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    configured: Option<&Path>,
    prompt: &str,
) -> ExportResult<PathBuf> {
    match configured {
        Some(path) => Ok(path.to_path_buf()),
        None => prompter.ask(prompt).map(PathBuf::from),
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
