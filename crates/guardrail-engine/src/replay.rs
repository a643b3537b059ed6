//! Recorded query results
//!
//! `ReplayExecutor` answers queries from a JSON file mapping query text to
//! either a row list or an error:
//!
//! ```json
//! {
//!   "SELECT COUNT(*) AS row_count FROM DEV_DB.marts.fact_orders": [{"ROW_COUNT": 42}],
//!   "SELECT ... FROM DEV_DB.staging.stg_users": {"error": "Object does not exist"}
//! }
//! ```
//!
//! Query text is matched after collapsing whitespace outside string
//! literals, so recordings may be pretty-printed.

use std::collections::HashMap;
use std::path::Path;
use guardrail_core::Row;
use serde::Deserialize;
use crate::runner::{ExecutionError, QueryExecutor};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RecordedResult {
    Rows(Vec<Row>),
    Error { error: String },
}

/// Executor serving previously recorded results
#[derive(Debug, Clone, Default)]
pub struct ReplayExecutor {
    recordings: HashMap<String, RecordedResult>,
}

impl ReplayExecutor {
    /// Load recordings from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ExecutionError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ExecutionError::Load(path.display().to_string(), e.to_string()))?;

        Self::from_json(&contents)
            .map_err(|e| ExecutionError::Load(path.display().to_string(), e.to_string()))
    }

    /// Parse recordings from a JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: HashMap<String, RecordedResult> = serde_json::from_str(json)?;
        let recordings = raw
            .into_iter()
            .map(|(sql, result)| (normalize_sql(&sql), result))
            .collect();

        Ok(Self { recordings })
    }

    /// Record rows for a query
    pub fn record_rows(&mut self, sql: &str, rows: Vec<Row>) {
        self.recordings.insert(normalize_sql(sql), RecordedResult::Rows(rows));
    }

    /// Record an error for a query
    pub fn record_error(&mut self, sql: &str, error: impl Into<String>) {
        self.recordings
            .insert(normalize_sql(sql), RecordedResult::Error { error: error.into() });
    }

    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }
}

impl QueryExecutor for ReplayExecutor {
    fn name(&self) -> &str {
        "replay"
    }

    fn execute(&self, sql: &str) -> Result<Vec<Row>, ExecutionError> {
        match self.recordings.get(&normalize_sql(sql)) {
            Some(RecordedResult::Rows(rows)) => Ok(rows.clone()),
            Some(RecordedResult::Error { error }) => Err(ExecutionError::Query(error.clone())),
            None => Err(ExecutionError::UnknownQuery(sql.to_string())),
        }
    }
}

/// Collapse whitespace runs to one space, leaving single-quoted literals intact
///
/// A doubled quote inside a literal closes and reopens it, so `''` escapes
/// need no special case.
fn normalize_sql(sql: &str) -> String {
    let mut normalized = String::with_capacity(sql.len());
    let mut in_literal = false;
    let mut pending_space = false;

    for c in sql.chars() {
        if !in_literal && c.is_whitespace() {
            pending_space = true;
            continue;
        }

        if pending_space && !normalized.is_empty() {
            normalized.push(' ');
        }
        pending_space = false;

        if c == '\'' {
            in_literal = !in_literal;
        }
        normalized.push(c);
    }

    normalized
}
