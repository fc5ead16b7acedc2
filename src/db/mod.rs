//! Database abstraction layer for Glance Runner.
//!
//! Provides a trait-based interface for database operations, allowing the
//! MySQL client and the in-memory mock to be used interchangeably.

mod mock;
mod mysql;
mod types;

pub use mock::{MockServer, MockTable};
pub use mysql::MySqlConnector;
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::error::Result;
use async_trait::async_trait;

/// Opens scratch connections to a database server.
///
/// Implementations hold the connection configuration; every call to
/// [`Connector::connect`] yields a brand-new session with no default database.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a new connection.
    async fn connect(&self) -> Result<Box<dyn Session>>;
}

/// A single open connection.
///
/// All operations are async and return Results with GlanceError. Callers must
/// finish with [`Session::close`] on every path.
#[async_trait]
pub trait Session: Send {
    /// Lists every database visible to the credentials, in server order.
    async fn list_databases(&mut self) -> Result<Vec<String>>;

    /// Selects the active database for subsequent statements.
    async fn use_database(&mut self, name: &str) -> Result<()>;

    /// Runs a statement that returns no rows (DDL, INSERT).
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Runs a query and returns the raw result.
    async fn query(&mut self, sql: &str) -> Result<QueryResult>;

    /// Closes the connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Quotes an identifier with backticks, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
