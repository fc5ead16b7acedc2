//! Query gate: admission, normalization, execution and result conversion.
//!
//! A request moves through `Validating → Normalizing → Executing` and ends in
//! exactly one of the [`GateOutcome`] states. Nothing is retried.

mod admission;
mod render;

pub use admission::{check_admission, has_limit_clause, is_select_query, normalize_query};
pub use render::{RenderRow, RenderValue, ResultSet, BLOB_MARKER};

use crate::config::QueryConfig;
use crate::db::{Connector, QueryResult, Session};
use crate::error::{GlanceError, Result};
use crate::probe::AccessibilityProber;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why the gate refused or failed a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateErrorKind {
    /// The database is not in the accessible list.
    InvalidDatabase,
    /// The query is blank.
    EmptyQuery,
    /// The query does not start with SELECT.
    NotSelect,
    /// The engine rejected or failed the query.
    Execution,
}

/// A user-facing gate error. Only the message reaches the page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct GateError {
    kind: GateErrorKind,
    message: String,
}

impl GateError {
    /// The database is missing or not accessible.
    pub fn invalid_database() -> Self {
        Self {
            kind: GateErrorKind::InvalidDatabase,
            message: "invalid database".to_string(),
        }
    }

    /// The query text is blank.
    pub fn empty_query() -> Self {
        Self {
            kind: GateErrorKind::EmptyQuery,
            message: "empty query".to_string(),
        }
    }

    /// The query is not a SELECT.
    pub fn only_select() -> Self {
        Self {
            kind: GateErrorKind::NotSelect,
            message: "only SELECT allowed".to_string(),
        }
    }

    /// Execution failed; carries the engine's message verbatim.
    pub fn execution(message: impl Into<String>) -> Self {
        Self {
            kind: GateErrorKind::Execution,
            message: message.into(),
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> GateErrorKind {
        self.kind
    }

    /// Returns the user-facing message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true for admission failures (as opposed to execution failures).
    pub fn is_rejection(&self) -> bool {
        self.kind != GateErrorKind::Execution
    }
}

/// A successfully executed query.
#[derive(Debug, Clone)]
pub struct Execution {
    /// The text actually sent to the server.
    pub normalized_query: String,

    /// Render-safe result.
    pub result: ResultSet,
}

/// Terminal state of a gate run.
#[derive(Debug, Clone)]
pub enum GateOutcome {
    /// Admission failed; nothing was executed.
    Rejected(GateError),
    /// The query ran.
    Succeeded(Execution),
    /// The query was sent but execution failed.
    Failed(GateError),
}

impl GateOutcome {
    /// Collapses the outcome into a result for callers that only need the data or the message.
    pub fn into_result(self) -> std::result::Result<Execution, GateError> {
        match self {
            Self::Succeeded(execution) => Ok(execution),
            Self::Rejected(e) | Self::Failed(e) => Err(e),
        }
    }

    /// Returns the error, if any.
    pub fn error(&self) -> Option<&GateError> {
        match self {
            Self::Succeeded(_) => None,
            Self::Rejected(e) | Self::Failed(e) => Some(e),
        }
    }
}

/// Validates, rewrites and executes submitted queries.
pub struct QueryGate {
    connector: Arc<dyn Connector>,
    prober: AccessibilityProber,
    row_limit: u64,
    timeout: Duration,
    strict: bool,
}

impl QueryGate {
    /// Creates a gate that opens connections through `connector`.
    pub fn new(connector: Arc<dyn Connector>, config: &QueryConfig) -> Self {
        Self {
            prober: AccessibilityProber::new(Arc::clone(&connector)),
            connector,
            row_limit: config.row_limit,
            timeout: Duration::from_secs(config.timeout_secs),
            strict: config.strict,
        }
    }

    /// The prober used to build the list of valid databases.
    pub fn prober(&self) -> &AccessibilityProber {
        &self.prober
    }

    /// Probes the server, then validates and runs the query.
    ///
    /// Only a failed probe is returned as `Err`; every rejection or execution
    /// failure is part of the outcome.
    pub async fn run(&self, database: &str, query: &str) -> Result<GateOutcome> {
        let databases = self.prober.accessible_databases().await?;
        Ok(self.run_against(&databases, database, query).await)
    }

    /// Validates the query against an already-probed database list and runs it.
    pub async fn run_against(
        &self,
        databases: &[String],
        database: &str,
        query: &str,
    ) -> GateOutcome {
        if let Err(e) = check_admission(databases, database, query, self.strict) {
            debug!("Rejected query for '{}': {}", database, e);
            return GateOutcome::Rejected(e);
        }

        let normalized = normalize_query(query, self.row_limit);
        let start = Instant::now();

        match self.execute(database, &normalized).await {
            Ok(raw) => {
                let elapsed = start.elapsed();
                let result = ResultSet::from(raw);
                info!(
                    "Query on '{}' returned {} rows in {:?}",
                    database, result.row_count, elapsed
                );
                GateOutcome::Succeeded(Execution {
                    normalized_query: normalized,
                    result,
                })
            }
            Err(e) => {
                warn!("Query on '{}' failed: {}", database, e);
                GateOutcome::Failed(GateError::execution(e.message()))
            }
        }
    }

    /// Opens a fresh connection, runs the query, and always closes the connection.
    async fn execute(&self, database: &str, sql: &str) -> Result<QueryResult> {
        let mut session = self.connector.connect().await?;
        let result = self.execute_in(session.as_mut(), database, sql).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close execution connection: {}", e);
        }

        result
    }

    async fn execute_in(
        &self,
        session: &mut dyn Session,
        database: &str,
        sql: &str,
    ) -> Result<QueryResult> {
        session.use_database(database).await?;

        tokio::time::timeout(self.timeout, session.query(sql))
            .await
            .map_err(|_| {
                GlanceError::query(format!(
                    "Query timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            })?
    }
}
