//! Review report schema (results.json v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};
use crate::result::{CheckResult, CheckStatus};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Verdict counts for a review
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub fail: usize,
    pub warn: usize,
    pub pass: usize,
    pub skip: usize,
}

impl ReviewSummary {
    pub fn from_results(results: &[CheckResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.record(result.status);
        }
        summary
    }

    fn record(&mut self, status: CheckStatus) {
        match status {
            CheckStatus::Fail => self.fail += 1,
            CheckStatus::Warn => self.warn += 1,
            CheckStatus::Pass => self.pass += 1,
            CheckStatus::Skip => self.skip += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.fail + self.warn + self.pass + self.skip
    }
}

impl std::fmt::Display for ReviewSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} FAIL / {} WARN / {} PASS", self.fail, self.warn, self.pass)?;
        if self.skip > 0 {
            write!(f, " / {} SKIP", self.skip)?;
        }
        Ok(())
    }
}

/// Output of one review run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewReport {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    pub summary: ReviewSummary,

    /// Names of the models checks were generated for
    pub models_reviewed: Vec<String>,

    /// Names of models downstream of the reviewed models
    pub blast_radius: Vec<String>,

    pub duration_seconds: f64,

    pub results: Vec<CheckResult>,
}

impl ReviewReport {
    /// Build a report from results, computing the summary
    pub fn new(
        models_reviewed: Vec<String>,
        blast_radius: Vec<String>,
        results: Vec<CheckResult>,
        duration_seconds: f64,
    ) -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary: ReviewSummary::from_results(&results),
            models_reviewed,
            blast_radius,
            duration_seconds: (duration_seconds * 10.0).round() / 10.0,
            results,
        }
    }

    /// Check if any result failed
    pub fn has_failures(&self) -> bool {
        self.summary.fail > 0
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load a previously saved report
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Save to file, creating parent directories
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

/// Order results for presentation: status (FAIL first), importance, model, check
pub fn sort_results(results: &mut [CheckResult]) {
    results.sort_by(|a, b| {
        a.status
            .cmp(&b.status)
            .then(a.importance.cmp(&b.importance))
            .then_with(|| a.model.cmp(&b.model))
            .then_with(|| a.check.as_str().cmp(b.check.as_str()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CheckCategory, CheckName, CheckSpec, Importance};
    use pretty_assertions::assert_eq;

    fn result(model: &str, check: CheckName, importance: Importance, status: CheckStatus) -> CheckResult {
        let spec = CheckSpec::new(CheckCategory::Grain, model, check, "", importance);
        CheckResult::new(&spec, status, "")
    }

    #[test]
    fn summary_counts() {
        let results = vec![
            result("a", CheckName::RowCount, Importance::Normal, CheckStatus::Pass),
            result("a", CheckName::NullRate, Importance::High, CheckStatus::Warn),
            result("b", CheckName::PkDuplicates, Importance::Tier0, CheckStatus::Fail),
            result("b", CheckName::RowCount, Importance::Normal, CheckStatus::Pass),
        ];

        let report = ReviewReport::new(vec!["a".into(), "b".into()], vec![], results, 1.234);
        assert_eq!(report.version, ReportVersion::CURRENT);
        assert_eq!(
            report.summary,
            ReviewSummary { fail: 1, warn: 1, pass: 2, skip: 0 }
        );
        assert_eq!(report.summary.total(), 4);
        assert_eq!(report.summary.to_string(), "1 FAIL / 1 WARN / 2 PASS");
        assert_eq!(report.duration_seconds, 1.2);
        assert!(report.has_failures());
    }

    #[test]
    fn results_sort_by_status_then_importance() {
        let mut results = vec![
            result("b", CheckName::RowCount, Importance::Normal, CheckStatus::Pass),
            result("a", CheckName::NullRate, Importance::High, CheckStatus::Fail),
            result("a", CheckName::PkDuplicates, Importance::Tier0, CheckStatus::Fail),
            result("a", CheckName::UnexpectedValues, Importance::High, CheckStatus::Warn),
            result("a", CheckName::RowCount, Importance::Normal, CheckStatus::Skip),
        ];

        sort_results(&mut results);

        let order: Vec<(CheckStatus, &str)> = results
            .iter()
            .map(|r| (r.status, r.check.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (CheckStatus::Fail, "pk_duplicates"),
                (CheckStatus::Fail, "null_rate"),
                (CheckStatus::Warn, "unexpected_values"),
                (CheckStatus::Pass, "row_count"),
                (CheckStatus::Skip, "row_count"),
            ]
        );
    }

    #[test]
    fn report_json_roundtrip() {
        let results = vec![result("a", CheckName::RowCount, Importance::Normal, CheckStatus::Pass)];
        let report = ReviewReport::new(vec!["a".into()], vec!["c".into()], results, 0.0);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"models_reviewed\""));
        assert!(json.contains("\"blast_radius\""));

        let parsed = ReviewReport::from_json(&json).unwrap();
        assert_eq!(parsed, report);
    }
}
