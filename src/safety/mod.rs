//! Statement-level classification for the strict query gate.
//!
//! Uses sqlparser-rs with the MySQL dialect. The default gate only looks at the
//! `SELECT` prefix; this module backs the opt-in strict mode, which also
//! requires the text to be exactly one read-only query.

use sqlparser::ast::{Query, Select, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use std::fmt;

/// Outcome of classifying a SQL string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A single query that reads data only.
    ReadOnlyQuery,
    /// A single statement that is not a plain query, or a query wrapping a mutation.
    Mutating(String),
    /// More than one statement.
    MultipleStatements(usize),
    /// The text did not parse.
    Unparseable(String),
    /// Nothing but whitespace or comments.
    Empty,
}

impl Classification {
    /// Returns true if the strict gate lets this text through.
    pub fn is_admissible(&self) -> bool {
        matches!(self, Self::ReadOnlyQuery)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnlyQuery => write!(f, "read-only query"),
            Self::Mutating(kind) => write!(f, "mutating statement ({kind})"),
            Self::MultipleStatements(n) => write!(f, "{n} statements"),
            Self::Unparseable(e) => write!(f, "unparseable: {e}"),
            Self::Empty => write!(f, "empty"),
        }
    }
}

/// SQL classifier bound to the MySQL dialect.
#[derive(Debug)]
pub struct SqlClassifier {
    dialect: MySqlDialect,
}

impl Default for SqlClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlClassifier {
    /// Creates a new SQL classifier.
    pub fn new() -> Self {
        Self {
            dialect: MySqlDialect {},
        }
    }

    /// Classifies a SQL string.
    pub fn classify(&self, sql: &str) -> Classification {
        let statements = match Parser::parse_sql(&self.dialect, sql) {
            Ok(statements) => statements,
            Err(e) => return Classification::Unparseable(e.to_string()),
        };

        match statements.as_slice() {
            [] => Classification::Empty,
            [Statement::Query(query)] => match query_mutation(query) {
                Some(kind) => Classification::Mutating(kind.to_string()),
                None => Classification::ReadOnlyQuery,
            },
            [other] => Classification::Mutating(statement_kind(other).to_string()),
            many => Classification::MultipleStatements(many.len()),
        }
    }
}

/// Convenience function to classify SQL without creating a classifier instance.
pub fn classify_sql(sql: &str) -> Classification {
    SqlClassifier::new().classify(sql)
}

/// Short name for a non-query statement.
fn statement_kind(statement: &Statement) -> &'static str {
    match statement {
        Statement::Insert(_) => "INSERT",
        Statement::Update { .. } => "UPDATE",
        Statement::Delete(_) => "DELETE",
        Statement::Drop { .. } => "DROP",
        Statement::Truncate { .. } => "TRUNCATE",
        Statement::AlterTable { .. } => "ALTER",
        Statement::CreateTable { .. } | Statement::CreateDatabase { .. } => "CREATE",
        Statement::Grant { .. } => "GRANT",
        Statement::Revoke { .. } => "REVOKE",
        Statement::Explain { .. } => "EXPLAIN",
        _ => "other",
    }
}

/// Walks a query looking for data-modifying bodies in CTEs or subqueries.
fn query_mutation(query: &Query) -> Option<&'static str> {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            if let Some(kind) = query_mutation(&cte.query) {
                return Some(kind);
            }
        }
    }
    set_expr_mutation(&query.body)
}

fn set_expr_mutation(set_expr: &SetExpr) -> Option<&'static str> {
    match set_expr {
        SetExpr::Select(select) => select_mutation(select),
        SetExpr::Query(query) => query_mutation(query),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_mutation(left).or_else(|| set_expr_mutation(right))
        }
        SetExpr::Values(_) | SetExpr::Table(_) => None,
        SetExpr::Insert(_) => Some("INSERT"),
        SetExpr::Update(_) => Some("UPDATE"),
        #[allow(unreachable_patterns)]
        _ => Some("other"),
    }
}

fn select_mutation(select: &Select) -> Option<&'static str> {
    select.from.iter().find_map(table_with_joins_mutation)
}

fn table_with_joins_mutation(twj: &TableWithJoins) -> Option<&'static str> {
    table_factor_mutation(&twj.relation).or_else(|| {
        twj.joins
            .iter()
            .find_map(|join| table_factor_mutation(&join.relation))
    })
}

fn table_factor_mutation(factor: &TableFactor) -> Option<&'static str> {
    match factor {
        TableFactor::Derived { subquery, .. } => query_mutation(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => table_with_joins_mutation(table_with_joins),
        _ => None,
    }
}
