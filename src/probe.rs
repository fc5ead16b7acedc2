//! Database discovery.
//!
//! Lists the databases the configured credentials can actually select,
//! skipping the server's own catalogs.

use crate::db::{Connector, Session};
use crate::error::Result;
use std::sync::Arc;
use tracing::{debug, warn};

/// System catalogs never offered to users. Matched case-sensitively.
pub const HIDDEN_DATABASES: [&str; 4] =
    ["information_schema", "mysql", "performance_schema", "sys"];

/// Returns true if the name is one of the hidden system catalogs.
pub fn is_hidden(name: &str) -> bool {
    HIDDEN_DATABASES.contains(&name)
}

/// Enumerates accessible databases on one scratch connection per call.
#[derive(Clone)]
pub struct AccessibilityProber {
    connector: Arc<dyn Connector>,
}

impl AccessibilityProber {
    /// Creates a prober that connects through `connector`.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Returns accessible database names in server order.
    ///
    /// Failing to connect or to list databases is an error. A database that
    /// cannot be selected is logged and left out.
    pub async fn accessible_databases(&self) -> Result<Vec<String>> {
        let mut session = self.connector.connect().await?;
        let result = probe(session.as_mut()).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close probe connection: {}", e);
        }

        result
    }
}

async fn probe(session: &mut dyn Session) -> Result<Vec<String>> {
    let candidates = session.list_databases().await?;
    let mut accessible = Vec::with_capacity(candidates.len());

    for name in candidates.into_iter().filter(|name| !is_hidden(name)) {
        match session.use_database(&name).await {
            Ok(()) => accessible.push(name),
            Err(e) => warn!("Skipping inaccessible database '{}': {}", name, e.message()),
        }
    }

    debug!("Accessible databases: {:?}", accessible);
    Ok(accessible)
}
