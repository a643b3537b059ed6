//! Check results

use serde::{Deserialize, Serialize};
use crate::check::{CheckCategory, CheckName, CheckSpec, Importance};

/// One row returned by an executed query (column name -> value)
///
/// Column-name casing depends on the warehouse; read rows through a
/// case-insensitive accessor rather than indexing directly.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Verdict for an executed check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    /// Blocking issue
    Fail,

    /// Should be reviewed, not blocking
    Warn,

    /// Check succeeded
    Pass,

    /// Check was not executed
    Skip,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fail => write!(f, "FAIL"),
            Self::Warn => write!(f, "WARN"),
            Self::Pass => write!(f, "PASS"),
            Self::Skip => write!(f, "SKIP"),
        }
    }
}

/// Outcome of evaluating one executed `CheckSpec`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: CheckStatus,

    pub category: CheckCategory,

    pub model: String,

    pub check: CheckName,

    /// Human-readable explanation
    pub detail: String,

    pub importance: Importance,

    /// Rows returned by the primary query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<Vec<Row>>,

    /// Drill-down rows, fetched only for FAIL/WARN results with a sample query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_data: Option<Vec<Row>>,
}

impl CheckResult {
    /// Create a result for a spec, copying its category/model/check triad
    pub fn new(spec: &CheckSpec, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            category: spec.category,
            model: spec.model.clone(),
            check: spec.check.clone(),
            detail: detail.into(),
            importance: spec.importance,
            raw_data: None,
            sample_data: None,
        }
    }

    /// Result for a check that was not executed
    pub fn skipped(spec: &CheckSpec, reason: impl Into<String>) -> Self {
        Self::new(spec, CheckStatus::Skip, reason)
    }

    /// Result for a check whose primary query could not be run
    pub fn execution_error(spec: &CheckSpec, error: impl std::fmt::Display) -> Self {
        Self::new(spec, CheckStatus::Fail, format!("SQL error: {}", error))
    }

    /// Keep the primary query rows
    pub fn with_raw_data(mut self, rows: Vec<Row>) -> Self {
        self.raw_data = Some(rows);
        self
    }

    /// Attach drill-down rows
    pub fn with_sample_data(mut self, rows: Vec<Row>) -> Self {
        self.sample_data = Some(rows);
        self
    }

    /// Whether drill-down rows are worth fetching for this verdict
    pub fn wants_sample(&self) -> bool {
        matches!(self.status, CheckStatus::Fail | CheckStatus::Warn)
    }
}
