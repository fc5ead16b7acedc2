//! Error types for Glance Runner.
//!
//! Defines the main error enum used throughout the application. User-facing
//! query errors live in [`crate::gate::GateError`] and never turn into these.

use thiserror::Error;

/// Main error type for Glance Runner operations.
#[derive(Error, Debug)]
pub enum GlanceError {
    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution errors (syntax errors, permission errors, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// Configuration errors (invalid config file, bad connection string, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Page rendering errors.
    #[error("Render error: {0}")]
    Render(String),
}

impl GlanceError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a render error with the given message.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Config(_) => "Configuration Error",
            Self::Render(_) => "Render Error",
        }
    }

    /// Returns the bare message without the category prefix.
    ///
    /// Execution failures are reported to users with the engine's text verbatim,
    /// so the prefix added by `Display` has to be stripped.
    pub fn message(&self) -> &str {
        match self {
            Self::Connection(m)
            | Self::Query(m)
            | Self::Config(m)
            | Self::Render(m) => m,
        }
    }
}

/// Result type alias using GlanceError.
pub type Result<T> = std::result::Result<T, GlanceError>;
