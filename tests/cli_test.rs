//! Tests for the sql-export binary: exit codes, env file, and output.

use assert_cmd::Command;
use calamine::{Data, Reader, Xlsx, open_workbook};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{Connection, Executor};
use std::path::Path;

fn sql_export(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sql-export").unwrap();
    cmd.env_clear().current_dir(dir);
    cmd
}

async fn seed(path: &Path, sql: &str) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
    (&mut conn).execute(sql).await.unwrap();
    conn.close().await.unwrap();
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_unsupported_dialect_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let assert = sql_export(dir.path())
        .write_stdin("oracle\n")
        .assert()
        .code(1);
    assert!(stderr_of(assert.get_output()).contains("Unsupported database type: oracle"));
}

#[test]
fn test_missing_sql_file_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let assert = sql_export(dir.path())
        .env("SQL_FILE_PATH", "missing.sql")
        .write_stdin("sqlite\n")
        .assert()
        .code(1);
    assert!(stderr_of(assert.get_output()).contains("SQL file not found: missing.sql"));
}

#[test]
fn test_uncreatable_output_dir_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("query.sql"), "SELECT 1").unwrap();
    std::fs::write(dir.path().join("blocker"), "a file, not a directory").unwrap();

    let assert = sql_export(dir.path())
        .env("DB_TYPE", "sqlite")
        .env("SQL_FILE_PATH", "query.sql")
        .env("EXCEL_FILE_PATH", "blocker/sub/out.xlsx")
        .assert()
        .code(1);
    assert!(stderr_of(assert.get_output()).contains("Could not create directory"));
}

#[tokio::test]
async fn test_export_with_env_file() {
    let dir = tempfile::tempdir().unwrap();
    seed(
        &dir.path().join("data.db"),
        "CREATE TABLE t (id INTEGER, name TEXT);
         INSERT INTO t VALUES (1, 'a'), (2, 'b');",
    )
    .await;
    std::fs::write(dir.path().join("query.sql"), "SELECT id, name FROM t ORDER BY id").unwrap();
    std::fs::write(
        dir.path().join("conn.env"),
        "DB_TYPE=sqlite\nDB_PATH=data.db\nSQL_FILE_PATH=query.sql\nEXCEL_FILE_PATH=out/result.xlsx\n",
    )
    .unwrap();

    let assert = sql_export(dir.path()).assert().code(0);
    let stderr = stderr_of(assert.get_output());
    assert!(stderr.contains("Connected to SQLite"));
    assert!(stderr.contains("Data exported successfully to out/result.xlsx"));
    assert!(stderr.contains("Connection disposed"));

    let mut workbook: Xlsx<_> = open_workbook(dir.path().join("out/result.xlsx")).unwrap();
    let range = workbook.worksheet_range_at(0).unwrap().unwrap();
    let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();
    assert_eq!(
        rows,
        vec![
            vec![Data::String("id".into()), Data::String("name".into())],
            vec![Data::Float(1.0), Data::String("a".into())],
            vec![Data::Float(2.0), Data::String("b".into())],
        ]
    );
}

#[tokio::test]
async fn test_bad_sql_exits_0_and_logs_error() {
    let dir = tempfile::tempdir().unwrap();
    seed(&dir.path().join("data.db"), "CREATE TABLE t (id INTEGER);").await;
    std::fs::write(dir.path().join("bad.sql"), "SELECT nope FROM nowhere").unwrap();

    let assert = sql_export(dir.path())
        .env("DB_PATH", "data.db")
        .env("SQL_FILE_PATH", "bad.sql")
        .env("EXCEL_FILE_PATH", "out.xlsx")
        .write_stdin("sqlite\n")
        .assert()
        .code(0);
    let stderr = stderr_of(assert.get_output());
    assert!(stderr.contains("Error: Query failed"));
    assert!(stderr.contains("Connection disposed"));
    assert!(!dir.path().join("out.xlsx").exists());
}

#[test]
fn test_debug_log_hides_password() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("query.sql"), "SELECT 1").unwrap();

    let assert = sql_export(dir.path())
        .env("EXPORT_LOG_LEVEL", "debug")
        .env("DB_TYPE", "sqlite")
        .env("DB_PATH", "absent.db")
        .env("DB_PASS", "s3cret")
        .env("SQL_FILE_PATH", "query.sql")
        .env("EXCEL_FILE_PATH", "out.xlsx")
        .assert()
        .code(0);
    let stderr = stderr_of(assert.get_output());
    assert!(stderr.contains("Resolved connection settings"));
    assert!(stderr.contains("absent.db"));
    assert!(!stderr.contains("s3cret"));
}

#[test]
fn test_flags_override_environment() {
    let dir = tempfile::tempdir().unwrap();
    let assert = sql_export(dir.path())
        .env("DB_TYPE", "sqlite")
        .args(["--db-type", "db2"])
        .assert()
        .code(1);
    assert!(stderr_of(assert.get_output()).contains("Unsupported database type: db2"));
}

#[test]
fn test_prompts_on_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let assert = sql_export(dir.path())
        .write_stdin("sqlite\nmissing.sql\n")
        .assert()
        .code(1);
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    assert!(stdout.starts_with("=== SQL to Excel Exporter ==="));
    assert!(stdout.contains("Enter database type (sqlserver/postgresql/mysql/sqlite): "));
    assert!(stdout.contains("Enter path to SQL file: "));
    assert!(!stdout.contains("Enter path for output Excel file: "));
}
