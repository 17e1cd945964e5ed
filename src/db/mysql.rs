//! MySQL database client implementation.
//!
//! Provides `MySqlDriver`, which opens one sqlx `MySqlConnection` per connect
//! call, and `MySqlClient`, which runs statements over the text protocol the
//! way an interactive client would.

use crate::db::{ColumnInfo, ConnectParams, DatabaseClient, Driver, QueryResult, Row, Value};
use crate::error::{ProbeError, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlDatabaseError, MySqlRow};
use futures::{Stream, TryStreamExt};
use sqlx::{
    Column as SqlxColumn, ConnectOptions, Connection, Either, Row as SqlxRow, TypeInfo, ValueRef,
};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::debug;

/// Driver that connects to MySQL servers with sqlx.
#[derive(Debug, Clone, Default)]
pub struct MySqlDriver;

impl MySqlDriver {
    pub fn new() -> Self {
        Self
    }

    fn connect_options(params: &ConnectParams) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .username(&params.username)
            .password(&params.password)
    }
}

#[async_trait]
impl Driver for MySqlDriver {
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn DatabaseClient>> {
        debug!("Connecting to MySQL at {}", params.display_string());

        let conn = Self::connect_options(params)
            .connect()
            .await
            .map_err(|e| map_connection_error(e, params))?;

        debug!("Connected to MySQL at {}", params.display_string());
        Ok(Box::new(MySqlClient::new(conn)))
    }
}

/// A single open MySQL connection.
#[derive(Debug)]
pub struct MySqlClient {
    conn: Mutex<Option<MySqlConnection>>,
}

impl MySqlClient {
    /// Wraps an already established connection.
    pub fn new(conn: MySqlConnection) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
        }
    }
}

#[async_trait]
impl DatabaseClient for MySqlClient {
    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| ProbeError::connection("Connection is already closed"))?;

        let start = Instant::now();
        let result: Vec<MySqlRow> = {
            let stream = sqlx::Executor::fetch_many(&mut *conn, sqlx::raw_sql(sql));
            first_result_set(stream)
                .await
                .map_err(|e| ProbeError::query(format_query_error(e)))?
        };
        let execution_time = start.elapsed();

        // Text protocol results carry column metadata on every row
        let columns: Vec<ColumnInfo> = match result.first() {
            Some(row) => row
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect(),
            None => describe_columns(conn, sql).await,
        };

        let rows: Vec<Row> = result.iter().map(convert_row).collect();
        let row_count = rows.len();

        debug!("Query returned {} rows in {:?}", row_count, execution_time);

        Ok(QueryResult {
            columns,
            rows,
            execution_time,
            row_count,
        })
    }

    async fn close(&self) -> Result<()> {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.close()
                .await
                .map_err(|e| ProbeError::connection(e.to_string()))?;
        }
        Ok(())
    }
}

/// Collects the rows of the first result set and ignores any that follow.
///
/// Multi-statement text yields one result summary per statement; the first
/// summary ends the rows that belong to the first statement.
async fn first_result_set<S, D, R, E>(mut stream: S) -> std::result::Result<Vec<R>, E>
where
    S: Stream<Item = std::result::Result<Either<D, R>, E>> + Unpin,
{
    let mut rows = Vec::new();
    while let Some(item) = stream.try_next().await? {
        match item {
            Either::Left(_) => break,
            Either::Right(row) => rows.push(row),
        }
    }
    Ok(rows)
}

/// Column metadata for a statement that returned no rows.
///
/// Asks the server to prepare the statement; text the server cannot prepare
/// (several statements, some administrative commands) reports no columns.
async fn describe_columns(conn: &mut MySqlConnection, sql: &str) -> Vec<ColumnInfo> {
    match sqlx::Executor::describe(conn, sql).await {
        Ok(describe) => describe
            .columns()
            .iter()
            .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
            .collect(),
        Err(e) => {
            debug!("Could not describe statement: {}", e);
            Vec::new()
        }
    }
}

/// Converts a sqlx MySqlRow to our Row type.
fn convert_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a MySqlRow to our Value type.
fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    let is_null = row
        .try_get_raw(index)
        .map(|value| value.is_null())
        .unwrap_or(true);
    if is_null {
        return Value::Null;
    }

    match type_name {
        "BOOLEAN" => row
            .try_get_unchecked::<bool, _>(index)
            .map(Value::Bool)
            .unwrap_or_else(|_| text_value(row, index)),

        name if name.ends_with("UNSIGNED") => row
            .try_get_unchecked::<u64, _>(index)
            .map(Value::from)
            .unwrap_or_else(|_| text_value(row, index)),

        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => row
            .try_get_unchecked::<i64, _>(index)
            .map(Value::Int)
            .unwrap_or_else(|_| text_value(row, index)),

        "FLOAT" | "DOUBLE" => row
            .try_get_unchecked::<f64, _>(index)
            .map(Value::Float)
            .unwrap_or_else(|_| text_value(row, index)),

        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" | "BIT"
        | "GEOMETRY" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        // DECIMAL, temporal types, JSON, ENUM, SET and character types
        _ => text_value(row, index),
    }
}

/// Reads a value as text, falling back to raw bytes for non-UTF-8 data.
fn text_value(row: &MySqlRow, index: usize) -> Value {
    if let Ok(s) = row.try_get_unchecked::<String, _>(index) {
        return Value::String(s);
    }
    row.try_get_unchecked::<Vec<u8>, _>(index)
        .map(Value::Bytes)
        .unwrap_or(Value::Null)
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, params: &ConnectParams) -> ProbeError {
    let host = &params.host;
    let port = params.port;
    let user = &params.username;

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        ProbeError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("access denied") {
        ProbeError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        ProbeError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else if error_str.contains("tls") || error_str.contains("ssl") {
        ProbeError::connection(format!("TLS negotiation with {host}:{port} failed: {error}"))
    } else {
        ProbeError::connection(format!("Cannot connect to {host}:{port}: {error}"))
    }
}

/// Formats a query error the way the mysql client prints it.
fn format_query_error(error: sqlx::Error) -> String {
    if let Some(db_error) = error.as_database_error() {
        if let Some(mysql_error) = db_error.try_downcast_ref::<MySqlDatabaseError>() {
            return match mysql_error.code() {
                Some(sqlstate) => format!(
                    "ERROR {} ({}): {}",
                    mysql_error.number(),
                    sqlstate,
                    mysql_error.message()
                ),
                None => format!("ERROR {}: {}", mysql_error.number(), mysql_error.message()),
            };
        }
        return format!("ERROR: {}", db_error.message());
    }

    error.to_string()
}
