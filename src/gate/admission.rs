//! Admission checks and query normalization.
//!
//! The SELECT check is a prefix match, not a parser. It does not look inside
//! comments or past the first statement; strict mode covers that when enabled.

use super::GateError;
use crate::safety::classify_sql;
use regex::Regex;
use std::sync::LazyLock;

static SELECT_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*SELECT\s+").expect("valid select prefix pattern"));

static LIMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)LIMIT\s+\d+").expect("valid limit pattern"));

/// Returns true if the text starts with `SELECT` followed by whitespace.
pub fn is_select_query(query: &str) -> bool {
    SELECT_PREFIX_RE.is_match(query)
}

/// Returns true if the text contains `LIMIT <digits>` anywhere.
pub fn has_limit_clause(query: &str) -> bool {
    LIMIT_RE.is_match(query)
}

/// Runs the admission checks in order; the first failure wins.
///
/// `databases` must be the prober's list for this request.
pub fn check_admission(
    databases: &[String],
    database: &str,
    query: &str,
    strict: bool,
) -> Result<(), GateError> {
    if database.is_empty() || !databases.iter().any(|d| d == database) {
        return Err(GateError::invalid_database());
    }

    if query.trim().is_empty() {
        return Err(GateError::empty_query());
    }

    if !is_select_query(query) {
        return Err(GateError::only_select());
    }

    if strict {
        let classification = classify_sql(query);
        if !classification.is_admissible() {
            tracing::debug!("Strict gate rejected query: {}", classification);
            return Err(GateError::only_select());
        }
    }

    Ok(())
}

/// Trims the query, strips trailing semicolons and appends `LIMIT <row_limit>`
/// unless the text already has a LIMIT clause.
pub fn normalize_query(query: &str, row_limit: u64) -> String {
    let trimmed = query.trim().trim_end_matches(';');

    if has_limit_clause(trimmed) {
        trimmed.to_string()
    } else {
        format!("{trimmed} LIMIT {row_limit}")
    }
}
