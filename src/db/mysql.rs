//! MySQL database client implementation.
//!
//! Provides the `MySqlConnector` / `MySqlSession` pair that implements the
//! `Connector` and `Session` traits for MySQL and MariaDB servers using sqlx.

use crate::config::ConnectionConfig;
use crate::db::{quote_identifier, ColumnInfo, Connector, QueryResult, Row, Session, Value};
use crate::error::{GlanceError, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{
    Column as SqlxColumn, ConnectOptions, Connection, Executor, Row as SqlxRow, Statement,
    TypeInfo, ValueRef,
};
use std::time::Duration;
use tracing::debug;

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Opens MySQL connections with a fixed set of credentials.
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    config: ConnectionConfig,
}

impl MySqlConnector {
    /// Creates a connector for the given server configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    /// Builds sqlx connect options without a default database.
    fn connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(self.config.host.as_deref().unwrap_or("localhost"))
            .port(self.config.port)
            .charset("utf8mb4");

        if let Some(user) = &self.config.user {
            options = options.username(user);
        }
        if let Some(password) = &self.config.password {
            options = options.password(password);
        }

        options
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    async fn connect(&self) -> Result<Box<dyn Session>> {
        debug!("Opening connection to {}", self.config.display_string());

        let conn = tokio::time::timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            self.connect_options().connect(),
        )
        .await
        .map_err(|_| {
            GlanceError::connection(format!(
                "Connection to {} timed out after {CONNECT_TIMEOUT_SECS} seconds",
                self.config.display_string()
            ))
        })?
        .map_err(|e| map_connection_error(e, &self.config))?;

        Ok(Box::new(MySqlSession { conn }))
    }
}

/// A single MySQL connection.
///
/// Statements are sent as plain text (`COM_QUERY`), so `USE` and any query the
/// user submits behave exactly as they would in the `mysql` shell.
#[derive(Debug)]
pub struct MySqlSession {
    conn: MySqlConnection,
}

#[async_trait]
impl Session for MySqlSession {
    async fn list_databases(&mut self) -> Result<Vec<String>> {
        let rows = self
            .conn
            .fetch_all("SHOW DATABASES")
            .await
            .map_err(|e| {
                GlanceError::query(format!(
                    "Failed to list databases: {}",
                    format_query_error(e)
                ))
            })?;

        rows.iter()
            .map(|row| {
                row.try_get_unchecked::<String, _>(0)
                    .map_err(|e| GlanceError::query(format!("Failed to read database name: {e}")))
            })
            .collect()
    }

    async fn use_database(&mut self, name: &str) -> Result<()> {
        let sql = format!("USE {}", quote_identifier(name));
        self.conn
            .execute(sql.as_str())
            .await
            .map_err(|e| GlanceError::query(format_query_error(e)))?;
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.conn
            .execute(sql)
            .await
            .map_err(|e| GlanceError::query(format_query_error(e)))?;
        Ok(())
    }

    async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        // Prepared statements hold exactly one statement, so stacked text is
        // refused by the server instead of being run piece by piece.
        let result = sqlx::query(sql)
            .persistent(false)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| GlanceError::query(format_query_error(e)))?;

        // Column metadata comes from the first row if available, otherwise
        // from a prepared statement for the same text.
        let columns: Vec<ColumnInfo> = if let Some(first_row) = result.first() {
            column_info(first_row.columns())
        } else {
            self.fetch_column_metadata(sql).await
        };

        let rows: Vec<Row> = result.iter().map(convert_row).collect();

        Ok(QueryResult { columns, rows })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| GlanceError::connection(format!("Failed to close connection: {e}")))
    }
}

impl MySqlSession {
    /// Best-effort column metadata for a query that returned no rows.
    async fn fetch_column_metadata(&mut self, sql: &str) -> Vec<ColumnInfo> {
        match self.conn.prepare(sql).await {
            Ok(statement) => column_info(statement.columns()),
            Err(e) => {
                debug!("Could not describe empty result: {e}");
                Vec::new()
            }
        }
    }
}

fn column_info(columns: &[sqlx::mysql::MySqlColumn]) -> Vec<ColumnInfo> {
    columns
        .iter()
        .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
        .collect()
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
///
/// Rows come from prepared statements, so values use the binary protocol.
fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(_) => return Value::Null,
    }

    let type_name = type_name.to_uppercase();
    let unsigned = type_name.ends_with(" UNSIGNED");
    let base = type_name.trim_end_matches(" UNSIGNED");

    match base {
        "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            if unsigned {
                row.try_get_unchecked::<u64, _>(index)
                    .map(Value::UInt)
                    .unwrap_or_else(|_| text_or_bytes(row, index))
            } else {
                row.try_get_unchecked::<i64, _>(index)
                    .map(Value::Int)
                    .unwrap_or_else(|_| text_or_bytes(row, index))
            }
        }

        "FLOAT" => row
            .try_get::<f32, _>(index)
            .map(|v| Value::Float(widen_float(v)))
            .unwrap_or_else(|_| text_or_bytes(row, index)),

        "DOUBLE" => row
            .try_get::<f64, _>(index)
            .map(Value::Float)
            .unwrap_or_else(|_| text_or_bytes(row, index)),

        "DATE" | "DATETIME" | "TIMESTAMP" | "TIME" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .ok()
            .and_then(|raw| format_temporal(base, &raw))
            .map(Value::Text)
            .unwrap_or_else(|| text_or_bytes(row, index)),

        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        "JSON" => match row.try_get_unchecked::<String, _>(index) {
            Ok(text) => serde_json::from_str(&text)
                .map(Value::Json)
                .unwrap_or(Value::Text(text)),
            Err(_) => text_or_bytes(row, index),
        },

        // Strings, DECIMAL, ENUM and SET all arrive as length-encoded text.
        _ => text_or_bytes(row, index),
    }
}

/// Widens a FLOAT through its shortest decimal form, so `1.1` stays `1.1`.
fn widen_float(value: f32) -> f64 {
    value.to_string().parse().unwrap_or(value as f64)
}

/// Formats a binary-protocol DATE, DATETIME, TIMESTAMP or TIME value the way
/// the server prints it in text results.
fn format_temporal(type_name: &str, raw: &[u8]) -> Option<String> {
    // The payload may still carry its one-byte length prefix.
    let body = match raw.split_first() {
        Some((&len, rest)) if len as usize == rest.len() => rest,
        _ => raw,
    };

    if type_name == "TIME" {
        return format_time(body);
    }

    let (year, month, day) = match body.len() {
        0 => (0, 0, 0),
        4 | 7 | 11 => (u16::from_le_bytes([body[0], body[1]]), body[2], body[3]),
        _ => return None,
    };
    let date = format!("{year:04}-{month:02}-{day:02}");
    if type_name == "DATE" {
        return Some(date);
    }

    let (hour, minute, second) = if body.len() >= 7 {
        (body[4], body[5], body[6])
    } else {
        (0, 0, 0)
    };
    let mut text = format!("{date} {hour:02}:{minute:02}:{second:02}");
    if body.len() == 11 {
        let micros = u32::from_le_bytes([body[7], body[8], body[9], body[10]]);
        if micros > 0 {
            text.push_str(&format!(".{micros:06}"));
        }
    }
    Some(text)
}

fn format_time(body: &[u8]) -> Option<String> {
    match body.len() {
        0 => return Some("00:00:00".to_string()),
        8 | 12 => {}
        _ => return None,
    }

    let sign = if body[0] == 1 { "-" } else { "" };
    let days = u32::from_le_bytes([body[1], body[2], body[3], body[4]]);
    let hours = u64::from(days) * 24 + u64::from(body[5]);
    let mut text = format!("{sign}{hours:02}:{:02}:{:02}", body[6], body[7]);
    if body.len() == 12 {
        let micros = u32::from_le_bytes([body[8], body[9], body[10], body[11]]);
        if micros > 0 {
            text.push_str(&format!(".{micros:06}"));
        }
    }
    Some(text)
}

/// Decodes a value as UTF-8 text, falling back to raw bytes.
fn text_or_bytes(row: &MySqlRow, index: usize) -> Value {
    match row.try_get_unchecked::<String, _>(index) {
        Ok(text) => Value::Text(text),
        Err(_) => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(Value::Bytes)
            .unwrap_or(Value::Null),
    }
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> GlanceError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port;
    let user = config.user.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        GlanceError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("access denied") {
        GlanceError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        GlanceError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        GlanceError::connection(error.to_string())
    }
}

/// Extracts the engine's own message from a query error.
fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => db_error.message().to_string(),
        None => error.to_string(),
    }
}
