//! Mock database server for testing.
//!
//! Provides an in-memory server with a handful of databases and tables. It
//! understands just enough SQL for the runner: `USE`, `SELECT <cols> FROM <t>
//! [LIMIT n]`, and the `CREATE DATABASE` / `CREATE TABLE` / `INSERT` statements
//! the seeder issues. Connections are counted so tests can check that every
//! opened session gets closed.

use super::{ColumnInfo, Connector, QueryResult, Row, Session, Value};
use crate::error::{GlanceError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Catalogs every MySQL server ships with.
const BUILTIN_DATABASES: &[&str] = &["information_schema", "mysql", "performance_schema", "sys"];

static SELECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*SELECT\s+(.+?)\s+FROM\s+`?(\w+)`?(?:\s+LIMIT\s+(\d+))?\s*$")
        .expect("valid select pattern")
});

static CREATE_DATABASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*CREATE\s+DATABASE\s+`?(\w+)`?").expect("valid create database pattern")
});

static CREATE_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*CREATE\s+TABLE\s+`?(\w+)`?\s*\((.*)\)\s*$")
        .expect("valid create table pattern")
});

static INSERT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*INSERT\s+INTO\s+`?(\w+)`?\s*\(([^)]*)\)\s*VALUES\s*(.*)$")
        .expect("valid insert pattern")
});

/// An in-memory table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockTable {
    columns: Vec<String>,
    rows: Vec<Row>,
    auto_increment: Option<usize>,
}

impl MockTable {
    /// Creates an empty table with the given column names.
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
            auto_increment: None,
        }
    }

    /// Appends a row. Values are matched to columns by position.
    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.rows.push(values);
        self
    }

    /// Column names in declaration order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Stored rows.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}

#[derive(Debug, Clone)]
struct MockDatabase {
    name: String,
    accessible: bool,
    tables: Vec<(String, MockTable)>,
}

impl MockDatabase {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            accessible: true,
            tables: Vec::new(),
        }
    }

    fn table(&self, name: &str) -> Option<&MockTable> {
        self.tables.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    fn table_mut(&mut self, name: &str) -> Option<&mut MockTable> {
        self.tables
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }
}

#[derive(Debug, Default)]
struct MockState {
    databases: Vec<MockDatabase>,
    connect_error: Option<String>,
    listing_error: Option<String>,
    query_delay: Option<Duration>,
    queries: Vec<String>,
    statements: Vec<String>,
}

/// A mock database server that keeps its catalog in memory.
///
/// Cloning shares the same catalog and counters.
#[derive(Debug, Clone)]
pub struct MockServer {
    state: Arc<Mutex<MockState>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl MockServer {
    /// Creates a server holding only the built-in system catalogs.
    pub fn new() -> Self {
        let state = MockState {
            databases: BUILTIN_DATABASES
                .iter()
                .map(|name| MockDatabase::new(name))
                .collect(),
            ..MockState::default()
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds an empty database if it does not exist yet.
    pub fn with_database(self, name: &str) -> Self {
        {
            let mut state = self.state();
            if !state.databases.iter().any(|d| d.name == name) {
                state.databases.push(MockDatabase::new(name));
            }
        }
        self
    }

    /// Adds a table, creating its database if needed.
    pub fn with_table(self, database: &str, name: &str, table: MockTable) -> Self {
        let server = self.with_database(database);
        {
            let mut state = server.state();
            if let Some(db) = state.databases.iter_mut().find(|d| d.name == database) {
                db.tables.retain(|(n, _)| n != name);
                db.tables.push((name.to_string(), table));
            }
        }
        server
    }

    /// Makes `USE <database>` fail with an access-denied error.
    pub fn deny_access(self, database: &str) -> Self {
        {
            let mut state = self.state();
            if let Some(db) = state.databases.iter_mut().find(|d| d.name == database) {
                db.accessible = false;
            }
        }
        self
    }

    /// Makes every connection attempt fail.
    pub fn fail_connect(self, message: &str) -> Self {
        self.state().connect_error = Some(message.to_string());
        self
    }

    /// Makes `SHOW DATABASES` fail.
    pub fn fail_listing(self, message: &str) -> Self {
        self.state().listing_error = Some(message.to_string());
        self
    }

    /// Delays every query by the given duration.
    pub fn delay_queries(self, delay: Duration) -> Self {
        self.state().query_delay = Some(delay);
        self
    }

    /// Removes a database, as a concurrent `DROP DATABASE` would.
    pub fn drop_database(&self, name: &str) {
        self.state().databases.retain(|d| d.name != name);
    }

    /// Names of all databases, including inaccessible ones.
    pub fn database_names(&self) -> Vec<String> {
        self.state().databases.iter().map(|d| d.name.clone()).collect()
    }

    /// Returns a copy of a table, if present.
    pub fn table(&self, database: &str, name: &str) -> Option<MockTable> {
        self.state()
            .databases
            .iter()
            .find(|d| d.name == database)
            .and_then(|d| d.table(name).cloned())
    }

    /// Number of connections opened so far.
    pub fn connections_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of connections closed so far.
    pub fn connections_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// SQL text of every query sent through `Session::query`.
    pub fn executed_queries(&self) -> Vec<String> {
        self.state().queries.clone()
    }

    /// SQL text of every statement sent through `Session::execute`.
    pub fn executed_statements(&self) -> Vec<String> {
        self.state().statements.clone()
    }
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MockServer {
    async fn connect(&self) -> Result<Box<dyn Session>> {
        if let Some(message) = self.state().connect_error.clone() {
            return Err(GlanceError::connection(message));
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            server: self.clone(),
            current: None,
        }))
    }
}

/// A connection to a [`MockServer`].
#[derive(Debug)]
pub struct MockSession {
    server: MockServer,
    current: Option<String>,
}

impl MockSession {
    fn current_database(&self) -> Result<String> {
        self.current
            .clone()
            .ok_or_else(|| GlanceError::query("No database selected"))
    }

    fn run_select(&self, sql: &str) -> Result<QueryResult> {
        // Queries run as a single prepared statement.
        if sql.contains(';') {
            return Err(GlanceError::query(
                "You have an error in your SQL syntax; check the manual that corresponds \
                 to your MySQL server version for the right syntax to use near ';'",
            ));
        }

        let captures = SELECT_RE.captures(sql).ok_or_else(|| {
            GlanceError::query(
                "You have an error in your SQL syntax; check the manual that corresponds \
                 to your MySQL server version for the right syntax to use",
            )
        })?;

        let database = self.current_database()?;
        let table_name = &captures[2];
        let state = self.server.state();
        let table = state
            .databases
            .iter()
            .find(|d| d.name == database)
            .and_then(|d| d.table(table_name))
            .ok_or_else(|| {
                GlanceError::query(format!("Table '{database}.{table_name}' doesn't exist"))
            })?;

        let projection = captures[1].trim();
        let indexes: Vec<usize> = if projection == "*" {
            (0..table.columns.len()).collect()
        } else {
            projection
                .split(',')
                .map(|c| c.trim().trim_matches('`'))
                .map(|c| {
                    table.columns.iter().position(|tc| tc == c).ok_or_else(|| {
                        GlanceError::query(format!("Unknown column '{c}' in 'field list'"))
                    })
                })
                .collect::<Result<_>>()?
        };

        let limit = captures
            .get(3)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or(usize::MAX);

        let columns = indexes
            .iter()
            .map(|&i| ColumnInfo::new(table.columns[i].clone(), "MOCK"))
            .collect();
        let rows = table
            .rows
            .iter()
            .take(limit)
            .map(|row| {
                indexes
                    .iter()
                    .map(|&i| row.get(i).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Ok(QueryResult::with_data(columns, rows))
    }

    fn run_statement(&self, sql: &str) -> Result<()> {
        if let Some(captures) = CREATE_DATABASE_RE.captures(sql) {
            let name = &captures[1];
            let mut state = self.server.state();
            if state.databases.iter().any(|d| d.name == name) {
                return Err(GlanceError::query(format!(
                    "Can't create database '{name}'; database exists"
                )));
            }
            state.databases.push(MockDatabase::new(name));
            return Ok(());
        }

        if let Some(captures) = CREATE_TABLE_RE.captures(sql) {
            let table = parse_table_definition(&captures[2]);
            let name = captures[1].to_string();
            let database = self.current_database()?;
            let mut state = self.server.state();
            let db = state
                .databases
                .iter_mut()
                .find(|d| d.name == database)
                .ok_or_else(|| GlanceError::query(format!("Unknown database '{database}'")))?;
            if db.table(&name).is_some() {
                return Err(GlanceError::query(format!(
                    "Table '{name}' already exists"
                )));
            }
            db.tables.push((name, table));
            return Ok(());
        }

        if let Some(captures) = INSERT_RE.captures(sql) {
            let name = &captures[1];
            let columns: Vec<String> = captures[2]
                .split(',')
                .map(|c| c.trim().trim_matches('`').to_string())
                .collect();
            let tuples = parse_value_tuples(&captures[3])?;
            let database = self.current_database()?;
            let mut state = self.server.state();
            let table = state
                .databases
                .iter_mut()
                .find(|d| d.name == database)
                .and_then(|d| d.table_mut(name))
                .ok_or_else(|| {
                    GlanceError::query(format!("Table '{database}.{name}' doesn't exist"))
                })?;
            return insert_rows(table, &columns, tuples);
        }

        Err(GlanceError::query(
            "You have an error in your SQL syntax; check the manual that corresponds \
             to your MySQL server version for the right syntax to use",
        ))
    }
}

#[async_trait]
impl Session for MockSession {
    async fn list_databases(&mut self) -> Result<Vec<String>> {
        let state = self.server.state();
        if let Some(message) = &state.listing_error {
            return Err(GlanceError::query(message.clone()));
        }
        Ok(state.databases.iter().map(|d| d.name.clone()).collect())
    }

    async fn use_database(&mut self, name: &str) -> Result<()> {
        let accessible = self
            .server
            .state()
            .databases
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.accessible);

        match accessible {
            None => Err(GlanceError::query(format!("Unknown database '{name}'"))),
            Some(false) => Err(GlanceError::query(format!(
                "Access denied for user 'mock'@'localhost' to database '{name}'"
            ))),
            Some(true) => {
                self.current = Some(name.to_string());
                Ok(())
            }
        }
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.server.state().statements.push(sql.to_string());
        self.run_statement(sql)
    }

    async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        let delay = {
            let mut state = self.server.state();
            state.queries.push(sql.to_string());
            state.query_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.run_select(sql)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.server.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Extracts column names from a `CREATE TABLE` body, skipping constraints.
fn parse_table_definition(body: &str) -> MockTable {
    let mut table = MockTable::default();
    for definition in body.split(',') {
        let definition = definition.trim();
        let Some(first) = definition.split_whitespace().next() else {
            continue;
        };
        let keyword = first.to_uppercase();
        if matches!(
            keyword.as_str(),
            "PRIMARY" | "FOREIGN" | "KEY" | "INDEX" | "UNIQUE" | "CONSTRAINT" | "CHECK"
        ) {
            continue;
        }
        // DECIMAL(10,2) splits into a trailing "2)" fragment.
        if first.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            continue;
        }
        if definition.to_uppercase().contains("AUTO_INCREMENT") {
            table.auto_increment = Some(table.columns.len());
        }
        table.columns.push(first.trim_matches('`').to_string());
    }
    table
}

/// Parses `(a, 'b'), (c, NULL)` into value tuples.
fn parse_value_tuples(input: &str) -> Result<Vec<Vec<Value>>> {
    let syntax_error = || GlanceError::query("Malformed VALUES list");
    let mut tuples = Vec::new();
    let mut chars = input.trim().trim_end_matches(';').chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}
        match chars.next() {
            None => break,
            Some('(') => {}
            Some(_) => return Err(syntax_error()),
        }

        let mut tuple = Vec::new();
        loop {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            match chars.peek() {
                Some('\'') => {
                    chars.next();
                    let mut text = String::new();
                    loop {
                        match chars.next() {
                            Some('\'') if chars.peek() == Some(&'\'') => {
                                chars.next();
                                text.push('\'');
                            }
                            Some('\'') => break,
                            Some(c) => text.push(c),
                            None => return Err(syntax_error()),
                        }
                    }
                    tuple.push(Value::Text(text));
                }
                Some(_) => {
                    let mut literal = String::new();
                    while let Some(c) = chars.next_if(|c| *c != ',' && *c != ')') {
                        literal.push(c);
                    }
                    tuple.push(parse_literal(literal.trim()));
                }
                None => return Err(syntax_error()),
            }

            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            match chars.next() {
                Some(',') => continue,
                Some(')') => break,
                _ => return Err(syntax_error()),
            }
        }
        tuples.push(tuple);
    }

    Ok(tuples)
}

/// Numbers with a fractional part stay textual, matching how DECIMAL arrives.
fn parse_literal(literal: &str) -> Value {
    if literal.eq_ignore_ascii_case("NULL") {
        Value::Null
    } else if let Ok(i) = literal.parse::<i64>() {
        Value::Int(i)
    } else {
        Value::Text(literal.to_string())
    }
}

fn insert_rows(table: &mut MockTable, columns: &[String], tuples: Vec<Vec<Value>>) -> Result<()> {
    let positions: Vec<usize> = columns
        .iter()
        .map(|c| {
            table
                .columns
                .iter()
                .position(|tc| tc == c)
                .ok_or_else(|| GlanceError::query(format!("Unknown column '{c}' in 'field list'")))
        })
        .collect::<Result<_>>()?;

    for tuple in tuples {
        if tuple.len() != positions.len() {
            return Err(GlanceError::query(
                "Column count doesn't match value count at row 1",
            ));
        }
        let mut row = vec![Value::Null; table.columns.len()];
        for (value, &position) in tuple.into_iter().zip(&positions) {
            row[position] = value;
        }
        if let Some(id_column) = table.auto_increment {
            if row[id_column].is_null() {
                row[id_column] = Value::Int(table.rows.len() as i64 + 1);
            }
        }
        table.rows.push(row);
    }

    Ok(())
}
