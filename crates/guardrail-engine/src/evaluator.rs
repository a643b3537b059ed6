//! PASS/WARN/FAIL evaluation of executed checks
//!
//! Each known check kind has its own rule; unrecognized kinds fall through
//! to an always-PASS default so newer check names never break evaluation.

use guardrail_core::{CheckName, CheckResult, CheckSpec, CheckStatus, Row, Thresholds};
use crate::format::{format_count, format_percent};
use crate::row::{display_value, RowAccessor};

const NO_DATA: &str = "No data returned";

/// Classify the rows of a check's primary query
///
/// `rows` must come from running `spec.sql`; nothing here can detect rows
/// that belong to a different spec.
pub fn evaluate_check(spec: &CheckSpec, rows: &[Row], thresholds: &Thresholds) -> CheckResult {
    match &spec.check {
        CheckName::PkDuplicates => evaluate_pk_duplicates(spec, rows),
        CheckName::NullRate => evaluate_null_rate(spec, rows, thresholds),
        CheckName::UnexpectedValues => evaluate_unexpected_values(spec, rows),
        CheckName::ValueDistribution => evaluate_value_distribution(spec, rows),
        CheckName::FkMatchRate => evaluate_fk_match_rate(spec, rows, thresholds),
        CheckName::RowCount => evaluate_row_count(spec, rows),
        CheckName::Other(name) => {
            tracing::debug!(check = %name, model = %spec.model, "no evaluator for check, passing");
            evaluate_default(spec, rows)
        }
    }
}

fn column_label(spec: &CheckSpec) -> &str {
    spec.column().unwrap_or("unknown")
}

fn evaluate_pk_duplicates(spec: &CheckSpec, rows: &[Row]) -> CheckResult {
    let Some(row) = rows.first() else {
        return CheckResult::new(spec, CheckStatus::Pass, NO_DATA);
    };

    let row = RowAccessor::new(row);
    let dupes = row.number_or("duplicate_count", 0.0);
    let total = row.number_or("total_rows", 0.0);

    let status = if dupes > 0.0 { CheckStatus::Fail } else { CheckStatus::Pass };
    let detail = format!(
        "{} duplicate {} values out of {} rows",
        format_count(dupes),
        column_label(spec),
        format_count(total)
    );

    CheckResult::new(spec, status, detail).with_raw_data(rows.to_vec())
}

fn evaluate_null_rate(spec: &CheckSpec, rows: &[Row], thresholds: &Thresholds) -> CheckResult {
    let Some(row) = rows.first() else {
        return CheckResult::new(spec, CheckStatus::Pass, NO_DATA);
    };

    let row = RowAccessor::new(row);
    let null_pct = row.number_or("null_pct", 0.0);
    let null_count = row.number_or("null_count", 0.0);
    let total = row.number_or("total_rows", 0.0);

    // Strict comparisons: a rate equal to a threshold does not trip it
    let rate = null_pct / 100.0;
    let status = if rate > thresholds.null_rate_fail {
        CheckStatus::Fail
    } else if rate > thresholds.null_rate_warn {
        CheckStatus::Warn
    } else {
        CheckStatus::Pass
    };

    let detail = format!(
        "{} nulls in {} ({}%) out of {} rows",
        format_count(null_count),
        column_label(spec),
        format_percent(null_pct),
        format_count(total)
    );

    CheckResult::new(spec, status, detail).with_raw_data(rows.to_vec())
}

/// Informational only: unexpected values WARN, never FAIL
fn evaluate_unexpected_values(spec: &CheckSpec, rows: &[Row]) -> CheckResult {
    if rows.is_empty() {
        return CheckResult::new(spec, CheckStatus::Pass, "No unexpected values found");
    }

    let unexpected: Vec<String> = rows
        .iter()
        .map(|row| {
            let row = RowAccessor::new(row);
            let value = row
                .get("unexpected_value")
                .map(display_value)
                .unwrap_or_else(|| "?".to_string());
            let count = row.number_or("row_count", 0.0);
            format!("'{}' ({} rows)", value, format_count(count))
        })
        .collect();

    let detail = format!(
        "{} unexpected value(s): {}",
        rows.len(),
        unexpected.join(", ")
    );

    CheckResult::new(spec, CheckStatus::Warn, detail).with_raw_data(rows.to_vec())
}

/// Always PASS; the rows are kept for reporting
fn evaluate_value_distribution(spec: &CheckSpec, rows: &[Row]) -> CheckResult {
    let detail = format!(
        "{} distinct values in {}",
        format_count(rows.len() as f64),
        column_label(spec)
    );

    CheckResult::new(spec, CheckStatus::Pass, detail).with_raw_data(rows.to_vec())
}

fn evaluate_fk_match_rate(spec: &CheckSpec, rows: &[Row], thresholds: &Thresholds) -> CheckResult {
    let Some(row) = rows.first() else {
        return CheckResult::new(spec, CheckStatus::Pass, NO_DATA);
    };

    let row = RowAccessor::new(row);
    let match_pct = row.number_or("match_pct", 100.0);
    let child_rows = row.number_or("child_rows", 0.0);
    let matched = row.number_or("matched_rows", 0.0);
    let parent = row
        .text("parent_model")
        .or_else(|| {
            spec.metadata
                .get("parent")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unknown".to_string());

    // Lower match is worse, so the comparisons run the other way from null_rate
    let rate = match_pct / 100.0;
    let status = if rate < thresholds.fk_match_rate_fail {
        CheckStatus::Fail
    } else if rate < thresholds.fk_match_rate_warn {
        CheckStatus::Warn
    } else {
        CheckStatus::Pass
    };

    let detail = format!(
        "{}/{} rows match {} ({}%)",
        format_count(matched),
        format_count(child_rows),
        parent,
        format_percent(match_pct)
    );

    CheckResult::new(spec, status, detail).with_raw_data(rows.to_vec())
}

/// An empty or unreadable relation is itself the defect, so no rows FAILs
fn evaluate_row_count(spec: &CheckSpec, rows: &[Row]) -> CheckResult {
    let Some(row) = rows.first() else {
        return CheckResult::new(spec, CheckStatus::Fail, NO_DATA);
    };

    let count = RowAccessor::new(row).number_or("row_count", 0.0);
    let status = if count == 0.0 { CheckStatus::Fail } else { CheckStatus::Pass };

    CheckResult::new(spec, status, format!("{} rows", format_count(count)))
        .with_raw_data(rows.to_vec())
}

fn evaluate_default(spec: &CheckSpec, rows: &[Row]) -> CheckResult {
    CheckResult::new(spec, CheckStatus::Pass, format!("{} row(s) returned", rows.len()))
        .with_raw_data(rows.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardrail_core::{CheckCategory, Importance};
    use serde_json::{json, Value};

    fn spec(check: CheckName, metadata: Value) -> CheckSpec {
        let mut spec = CheckSpec::new(CheckCategory::Grain, "fact_orders", check, "", Importance::Normal);
        if let Value::Object(map) = metadata {
            spec.metadata = map;
        }
        spec
    }

    fn rows(value: Value) -> Vec<Row> {
        serde_json::from_value(value).unwrap()
    }

    fn evaluate(check: CheckName, rows_json: Value) -> CheckResult {
        evaluate_check(
            &spec(check, json!({"column": "order_id", "parent": "stg_users"})),
            &rows(rows_json),
            &Thresholds::default(),
        )
    }

    #[test]
    fn pk_duplicates() {
        let result = evaluate(CheckName::PkDuplicates, json!([{"DUPLICATE_COUNT": 0, "TOTAL_ROWS": 1000}]));
        assert_eq!(result.status, CheckStatus::Pass);
        assert_eq!(result.detail, "0 duplicate order_id values out of 1,000 rows");
        assert!(result.raw_data.is_some());

        let result = evaluate(CheckName::PkDuplicates, json!([{"duplicate_count": 5, "total_rows": 1000}]));
        assert_eq!(result.status, CheckStatus::Fail);
        assert_eq!(result.detail, "5 duplicate order_id values out of 1,000 rows");

        let result = evaluate(CheckName::PkDuplicates, json!([]));
        assert_eq!(result.status, CheckStatus::Pass);
        assert_eq!(result.detail, "No data returned");
        assert!(result.raw_data.is_none());
    }

    #[test]
    fn null_rate_tiers() {
        let result = evaluate(CheckName::NullRate, json!([{"NULL_PCT": 0, "NULL_COUNT": 0, "TOTAL_ROWS": 1000}]));
        assert_eq!(result.status, CheckStatus::Pass);

        let result = evaluate(CheckName::NullRate, json!([{"NULL_PCT": 0.5, "NULL_COUNT": 5, "TOTAL_ROWS": 1000}]));
        assert_eq!(result.status, CheckStatus::Warn);
        assert_eq!(result.detail, "5 nulls in order_id (0.5%) out of 1,000 rows");

        let result = evaluate(CheckName::NullRate, json!([{"NULL_PCT": 10.0, "NULL_COUNT": 100, "TOTAL_ROWS": 1000}]));
        assert_eq!(result.status, CheckStatus::Fail);

        assert_eq!(evaluate(CheckName::NullRate, json!([])).status, CheckStatus::Pass);
    }

    #[test]
    fn null_rate_boundaries_are_strict() {
        let thresholds = Thresholds {
            null_rate_fail: 0.5,
            null_rate_warn: 0.25,
            ..Thresholds::default()
        };
        let spec = spec(CheckName::NullRate, json!({"column": "c"}));

        let at_warn = evaluate_check(&spec, &rows(json!([{"NULL_PCT": 25.0}])), &thresholds);
        assert_eq!(at_warn.status, CheckStatus::Pass);

        let at_fail = evaluate_check(&spec, &rows(json!([{"NULL_PCT": 50.0}])), &thresholds);
        assert_eq!(at_fail.status, CheckStatus::Warn);

        let above_fail = evaluate_check(&spec, &rows(json!([{"NULL_PCT": 50.5}])), &thresholds);
        assert_eq!(above_fail.status, CheckStatus::Fail);
    }

    #[test]
    fn null_rate_custom_thresholds() {
        let thresholds = Thresholds {
            null_rate_fail: 0.02,
            null_rate_warn: 0.005,
            ..Thresholds::default()
        };
        let result = evaluate_check(
            &spec(CheckName::NullRate, json!({"column": "user_id"})),
            &rows(json!([{"NULL_PCT": 1.0, "NULL_COUNT": 10, "TOTAL_ROWS": 1000}])),
            &thresholds,
        );
        assert_eq!(result.status, CheckStatus::Warn);
    }

    #[test]
    fn unexpected_values_only_warn() {
        let result = evaluate(CheckName::UnexpectedValues, json!([]));
        assert_eq!(result.status, CheckStatus::Pass);
        assert_eq!(result.detail, "No unexpected values found");

        let result = evaluate(
            CheckName::UnexpectedValues,
            json!([
                {"UNEXPECTED_VALUE": "unknown", "ROW_COUNT": 4200},
                {"unexpected_value": "lost", "row_count": 3}
            ]),
        );
        assert_eq!(result.status, CheckStatus::Warn);
        assert_eq!(
            result.detail,
            "2 unexpected value(s): 'unknown' (4,200 rows), 'lost' (3 rows)"
        );
    }

    #[test]
    fn value_distribution_always_passes() {
        let result = evaluate(
            CheckName::ValueDistribution,
            json!([
                {"VALUE": "completed", "ROW_COUNT": 900, "PCT": 90.0},
                {"VALUE": "bogus", "ROW_COUNT": 100, "PCT": 10.0}
            ]),
        );
        assert_eq!(result.status, CheckStatus::Pass);
        assert_eq!(result.detail, "2 distinct values in order_id");
        assert_eq!(result.raw_data.as_ref().map(Vec::len), Some(2));

        assert_eq!(evaluate(CheckName::ValueDistribution, json!([])).status, CheckStatus::Pass);
    }

    #[test]
    fn fk_match_rate_tiers() {
        let full = json!([{"MATCH_PCT": 100.0, "PARENT_MODEL": "stg_users", "CHILD_ROWS": 1000, "MATCHED_ROWS": 1000}]);
        let result = evaluate(CheckName::FkMatchRate, full);
        assert_eq!(result.status, CheckStatus::Pass);
        assert_eq!(result.detail, "1,000/1,000 rows match stg_users (100%)");

        let low = json!([{"MATCH_PCT": 97.5, "PARENT_MODEL": "stg_users", "CHILD_ROWS": 1000, "MATCHED_ROWS": 975}]);
        assert_eq!(evaluate(CheckName::FkMatchRate, low).status, CheckStatus::Warn);

        let very_low = json!([{"MATCH_PCT": 80.0, "CHILD_ROWS": 1000, "MATCHED_ROWS": 800}]);
        let result = evaluate(CheckName::FkMatchRate, very_low);
        assert_eq!(result.status, CheckStatus::Fail);
        // Parent falls back to the check metadata
        assert_eq!(result.detail, "800/1,000 rows match stg_users (80%)");

        assert_eq!(evaluate(CheckName::FkMatchRate, json!([])).status, CheckStatus::Pass);
    }

    #[test]
    fn fk_match_rate_boundary_is_inverted() {
        let thresholds = Thresholds::default();
        let spec = spec(CheckName::FkMatchRate, json!({"parent": "p"}));

        let at_fail = evaluate_check(&spec, &rows(json!([{"MATCH_PCT": 95.0}])), &thresholds);
        assert_eq!(at_fail.status, CheckStatus::Warn);

        let at_warn = evaluate_check(&spec, &rows(json!([{"MATCH_PCT": 99.0}])), &thresholds);
        assert_eq!(at_warn.status, CheckStatus::Pass);
    }

    #[test]
    fn row_count() {
        let result = evaluate(CheckName::RowCount, json!([]));
        assert_eq!(result.status, CheckStatus::Fail);
        assert_eq!(result.detail, "No data returned");

        let result = evaluate(CheckName::RowCount, json!([{"ROW_COUNT": 0}]));
        assert_eq!(result.status, CheckStatus::Fail);

        let result = evaluate(CheckName::RowCount, json!([{"ROW_COUNT": 52557}]));
        assert_eq!(result.status, CheckStatus::Pass);
        assert_eq!(result.detail, "52,557 rows");

        // Decimal columns may arrive as strings
        let result = evaluate(CheckName::RowCount, json!([{"row_count": "1234567"}]));
        assert_eq!(result.status, CheckStatus::Pass);
        assert_eq!(result.detail, "1,234,567 rows");
    }

    #[test]
    fn unknown_check_passes() {
        let result = evaluate(CheckName::from("freshness"), json!([{"x": 1}, {"x": 2}]));
        assert_eq!(result.status, CheckStatus::Pass);
        assert_eq!(result.detail, "2 row(s) returned");
    }
}
