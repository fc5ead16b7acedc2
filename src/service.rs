//! Page-level request handling.
//!
//! Every page view re-probes the server so the database list reflects the
//! current catalog. A submission is checked against that same list.

use crate::config::QueryConfig;
use crate::db::Connector;
use crate::error::Result;
use crate::gate::{GateOutcome, QueryGate, ResultSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A submitted form or JSON request. Missing fields are treated as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub query: String,
}

/// Everything a page needs to render.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageState {
    /// Databases offered in the selector.
    pub databases: Vec<String>,

    /// Database echoed back from the request.
    pub selected_database: String,

    /// Query text echoed back from the request.
    pub query: String,

    /// Result of a successful run.
    pub result: Option<ResultSet>,

    /// Rejection or execution failure message.
    pub error: Option<String>,
}

/// Builds page states from the prober and the gate.
pub struct QueryService {
    gate: QueryGate,
}

impl QueryService {
    pub fn new(connector: Arc<dyn Connector>, config: &QueryConfig) -> Self {
        Self {
            gate: QueryGate::new(connector, config),
        }
    }

    /// State for a plain page view: the database list and nothing else.
    pub async fn list_page(&self) -> Result<PageState> {
        let databases = self.gate.prober().accessible_databases().await?;
        Ok(PageState {
            databases,
            ..PageState::default()
        })
    }

    /// Probes once, then runs the submission against that list.
    ///
    /// Only a failed probe is an `Err`.
    pub async fn submit(&self, request: QueryRequest) -> Result<PageState> {
        let databases = self.gate.prober().accessible_databases().await?;
        let outcome = self
            .gate
            .run_against(&databases, &request.database, &request.query)
            .await;

        let (result, error) = match outcome {
            GateOutcome::Succeeded(execution) => (Some(execution.result), None),
            GateOutcome::Rejected(e) | GateOutcome::Failed(e) => {
                (None, Some(e.message().to_string()))
            }
        };

        Ok(PageState {
            databases,
            selected_database: request.database,
            query: request.query,
            result,
            error,
        })
    }
}
