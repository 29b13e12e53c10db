//! Opening database handles.
//!
//! A [`ConnectionDescriptor`] is turned into a live [`DbHandle`]: one
//! dedicated connection per run, no pooling. PostgreSQL, MySQL and SQLite go
//! through `sqlx`; SQL Server goes through `tiberius`, configured from the
//! encoded ODBC string carried in the descriptor's connection URL.

use crate::error::{ExportError, ExportResult};
use crate::models::{ConnectionDescriptor, DatabaseType, is_truthy, parse_odbc_pairs};
use crate::models::connection::ODBC_CONNECT_PARAM;
use sqlx::{
    ConnectOptions, Connection, MySqlConnection, PgConnection, SqliteConnection,
    mysql::MySqlConnectOptions, postgres::PgConnectOptions, sqlite::SqliteConnectOptions,
};
use std::str::FromStr;
use tiberius::{AuthMethod, Client, Config as MssqlConfig, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

/// SQL Server client over a tokio TCP stream.
pub type MssqlClient = Client<Compat<TcpStream>>;

/// A live connection owned by one export run.
///
/// Closing consumes the handle, so it cannot be used afterwards.
pub enum DbHandle {
    MySql(MySqlConnection),
    Postgres(PgConnection),
    SQLite(SqliteConnection),
    SqlServer(Box<MssqlClient>),
}

impl DbHandle {
    /// Get the database type for this handle.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbHandle::MySql(_) => DatabaseType::MySQL,
            DbHandle::Postgres(_) => DatabaseType::PostgreSQL,
            DbHandle::SQLite(_) => DatabaseType::SQLite,
            DbHandle::SqlServer(_) => DatabaseType::SqlServer,
        }
    }

    /// Close the connection.
    pub async fn close(self) -> ExportResult<()> {
        match self {
            DbHandle::MySql(conn) => conn.close().await.map_err(close_error),
            DbHandle::Postgres(conn) => conn.close().await.map_err(close_error),
            DbHandle::SQLite(conn) => conn.close().await.map_err(close_error),
            DbHandle::SqlServer(client) => (*client)
                .close()
                .await
                .map_err(|e| ExportError::connection(format!("Failed to close: {}", e), "")),
        }
    }
}

impl std::fmt::Debug for DbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DbHandle").field(&self.db_type()).finish()
    }
}

fn close_error(e: sqlx::Error) -> ExportError {
    ExportError::connection(format!("Failed to close: {}", e), "")
}

/// Open a handle for the given descriptor.
pub async fn connect(descriptor: ConnectionDescriptor) -> ExportResult<DbHandle> {
    let db_type = descriptor.db_type();
    debug!(
        db_type = %db_type,
        connection = %descriptor.masked_connection_string(),
        "Connecting to database"
    );

    let handle = match &descriptor {
        ConnectionDescriptor::MySQL { .. } => {
            let options = MySqlConnectOptions::from_str(&descriptor.connection_string())
                .map_err(|e| {
                    ExportError::connection(
                        format!("Invalid MySQL connection string: {}", e),
                        "Check DB_USER, DB_PASS, DB_HOST and DB_NAME",
                    )
                })?
                .charset("utf8mb4");
            let conn = options
                .connect()
                .await
                .map_err(|e| connect_error(db_type, &e.to_string()))?;
            DbHandle::MySql(conn)
        }
        ConnectionDescriptor::PostgreSQL { .. } => {
            let options = PgConnectOptions::from_str(&descriptor.connection_string())
                .map_err(|e| {
                    ExportError::connection(
                        format!("Invalid PostgreSQL connection string: {}", e),
                        "Check DB_USER, DB_PASS, DB_HOST and DB_NAME",
                    )
                })?;
            let conn = options
                .connect()
                .await
                .map_err(|e| connect_error(db_type, &e.to_string()))?;
            DbHandle::Postgres(conn)
        }
        ConnectionDescriptor::SQLite { path } => {
            if path.trim().is_empty() {
                return Err(ExportError::connection(
                    "No SQLite database path configured",
                    "Set DB_PATH to the database file",
                ));
            }
            // sqlite:/// URLs carry a relative path, so build options from the path itself.
            let conn = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(false)
                .connect()
                .await
                .map_err(|e| connect_error(db_type, &e.to_string()))?;
            DbHandle::SQLite(conn)
        }
        ConnectionDescriptor::SqlServer { .. } => {
            let config = mssql_config_from_url(&descriptor.connection_string())?;
            let client = connect_sql_server(config).await?;
            DbHandle::SqlServer(Box::new(client))
        }
    };

    info!("Connected to {}", db_type);
    Ok(handle)
}

async fn connect_sql_server(config: MssqlConfig) -> ExportResult<MssqlClient> {
    let tcp = TcpStream::connect_named(&config)
        .await
        .map_err(|e| connect_error(DatabaseType::SqlServer, &e.to_string()))?;
    tcp.set_nodelay(true)
        .map_err(|e| connect_error(DatabaseType::SqlServer, &e.to_string()))?;

    Client::connect(config, tcp.compat_write())
        .await
        .map_err(|e| connect_error(DatabaseType::SqlServer, &e.to_string()))
}

/// Decode the ODBC string carried by an `mssql+odbc:///?odbc_connect=` URL
/// and map it onto a tiberius configuration.
pub fn mssql_config_from_url(connection_string: &str) -> ExportResult<MssqlConfig> {
    let url = url::Url::parse(connection_string).map_err(|e| {
        ExportError::connection(
            format!("Invalid SQL Server connection URL: {}", e),
            "Check DB_DRIVER, DB_SERVER and DB_DATABASE",
        )
    })?;
    let odbc = url
        .query_pairs()
        .find(|(k, _)| k == ODBC_CONNECT_PARAM)
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| {
            ExportError::connection(
                "SQL Server connection URL has no odbc_connect parameter",
                "Check DB_DRIVER, DB_SERVER and DB_DATABASE",
            )
        })?;
    mssql_config_from_odbc(&odbc)
}

/// Map ODBC keywords onto a tiberius configuration.
///
/// `DRIVER` is only meaningful to an ODBC driver manager and is ignored; the
/// TDS protocol is spoken directly.
pub fn mssql_config_from_odbc(odbc: &str) -> ExportResult<MssqlConfig> {
    let pairs = parse_odbc_pairs(odbc);
    let get = |key: &str| {
        pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    };

    let server = get("SERVER").ok_or_else(|| {
        ExportError::connection(
            "No SQL Server host configured",
            "Set DB_SERVER, e.g. sql01 or sql01,1433 or sql01\\INSTANCE",
        )
    })?;
    let (host, port, instance) = split_server(server);

    let mut config = MssqlConfig::new();
    config.host(host);
    if let Some(port) = port {
        config.port(port);
    }
    if let Some(instance) = instance {
        config.instance_name(instance);
    }
    if let Some(database) = get("DATABASE") {
        config.database(database);
    }

    let trusted = get("TRUSTED_CONNECTION").is_some_and(is_truthy);
    let user = get("UID");
    let password = get("PWD").unwrap_or_default();

    let auth = match (trusted, user) {
        (false, Some(user)) => AuthMethod::sql_server(user, password),
        (true, user) => integrated_auth(user, password)?,
        (false, None) => {
            return Err(ExportError::connection(
                "No SQL Server credentials configured",
                "Set DB_TRUSTED_CONNECTION=yes, or DB_USER and DB_PASS",
            ));
        }
    };
    config.authentication(auth);
    config.trust_cert();
    config.application_name(env!("CARGO_PKG_NAME"));

    Ok(config)
}

#[cfg(windows)]
fn integrated_auth(_user: Option<&str>, _password: &str) -> ExportResult<AuthMethod> {
    Ok(AuthMethod::Integrated)
}

#[cfg(not(windows))]
fn integrated_auth(user: Option<&str>, password: &str) -> ExportResult<AuthMethod> {
    match user {
        Some(user) => {
            warn!("Integrated authentication is only available on Windows, using DB_USER/DB_PASS");
            Ok(AuthMethod::sql_server(user, password))
        }
        None => Err(ExportError::connection(
            "Trusted connections require Windows integrated authentication",
            "Set DB_USER and DB_PASS to use SQL Server authentication on this platform",
        )),
    }
}

/// Split an ODBC `SERVER` value into host, port and instance name.
///
/// Accepts `host`, `host,port`, `host\instance` and `tcp:host,port`.
pub fn split_server(server: &str) -> (&str, Option<u16>, Option<&str>) {
    let server = server.trim();
    let server = server.strip_prefix("tcp:").unwrap_or(server);

    if let Some((host, port)) = server.split_once(',') {
        return (host.trim(), port.trim().parse().ok(), None);
    }
    if let Some((host, instance)) = server.split_once('\\') {
        let instance = Some(instance.trim()).filter(|i| !i.is_empty());
        return (host.trim(), None, instance);
    }
    (server, None, None)
}

fn connect_error(db_type: DatabaseType, message: &str) -> ExportError {
    ExportError::connection(
        format!("Failed to connect to {}: {}", db_type, message),
        connection_suggestion(db_type, message),
    )
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(db_type: DatabaseType, message: &str) -> String {
    let error_str = message.to_lowercase();

    if error_str.contains("connection refused") {
        return format!(
            "Check that the {} server is running and accessible",
            db_type
        );
    }

    if error_str.contains("authentication")
        || error_str.contains("password")
        || error_str.contains("login failed")
    {
        return "Verify the user name and password (DB_USER / DB_PASS)".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration".to_string();
    }

    match db_type {
        DatabaseType::SqlServer => {
            "Verify DB_SERVER, DB_DATABASE and DB_TRUSTED_CONNECTION".to_string()
        }
        DatabaseType::PostgreSQL | DatabaseType::MySQL => {
            "Verify DB_USER, DB_PASS, DB_HOST and DB_NAME".to_string()
        }
        DatabaseType::SQLite => "Verify that the DB_PATH file exists and is readable".to_string(),
    }
}
