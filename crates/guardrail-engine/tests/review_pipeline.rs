//! Check generation and review runs against the two-models fixture project

use std::collections::BTreeMap;
use std::path::PathBuf;
use guardrail_core::{CheckCategory, CheckName, CheckStatus, Config, Importance, JoinKeyOverrides};
use guardrail_dbt::{Manifest, ModelGraph};
use guardrail_engine::{generate_checks, CheckGenerator, ReplayExecutor, ReviewPlan, ReviewRunner};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn fixture_manifest_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/two-models/target/manifest.json")
}

fn graph() -> ModelGraph {
    let manifest = Manifest::from_file(&fixture_manifest_path()).unwrap();
    ModelGraph::from_manifest(&manifest)
}

fn rows(value: Value) -> Vec<guardrail_core::Row> {
    serde_json::from_value(value).unwrap()
}

/// Parse the quoted literals of a `NOT IN (...)` list back into values
fn parse_not_in_list(sql: &str) -> Vec<String> {
    let start = sql.find("NOT IN (").unwrap() + "NOT IN (".len();
    let mut chars = sql[start..].chars().peekable();
    let mut values = Vec::new();

    loop {
        match chars.next() {
            Some('\'') => {
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some('\'') if chars.peek() == Some(&'\'') => {
                            chars.next();
                            value.push('\'');
                        }
                        Some('\'') => break,
                        Some(c) => value.push(c),
                        None => panic!("unterminated literal"),
                    }
                }
                values.push(value);
            }
            Some(',') | Some(' ') => continue,
            Some(')') => break,
            other => panic!("unexpected character in literal list: {:?}", other),
        }
    }

    values
}

#[test]
fn grain_checks_follow_declared_tests() {
    let graph = graph();
    let checks = generate_checks(&graph, &["fact_orders"], Some(&[CheckCategory::Grain]), &JoinKeyOverrides::new());

    let orders = graph.get_model_by_name("fact_orders").unwrap();
    let pk: Vec<_> = checks.iter().filter(|c| c.check == CheckName::PkDuplicates).collect();
    let nulls: Vec<_> = checks.iter().filter(|c| c.check == CheckName::NullRate).collect();

    assert_eq!(pk.len(), orders.unique_tests.len());
    assert_eq!(nulls.len(), orders.not_null_tests.len());
    assert_eq!(checks.len(), pk.len() + nulls.len());
    assert!(pk.iter().all(|c| c.importance == Importance::Tier0 && c.sample_sql.is_some()));
    assert!(nulls.iter().all(|c| c.importance == Importance::High && c.sample_sql.is_some()));
    assert!(checks.iter().all(|c| c.sql.contains("DEV_DB.marts.fact_orders")));
}

#[test]
fn full_generation_for_fact_orders() {
    let graph = graph();
    let checks = CheckGenerator::new(&graph).generate(&["fact_orders"], None);

    let summary: Vec<(CheckCategory, &str)> = checks
        .iter()
        .map(|c| (c.category, c.check.as_str()))
        .collect();

    assert_eq!(
        summary,
        vec![
            (CheckCategory::Grain, "pk_duplicates"),
            (CheckCategory::Grain, "null_rate"),
            (CheckCategory::Distribution, "value_distribution"),
            (CheckCategory::Distribution, "unexpected_values"),
            (CheckCategory::Join, "fk_match_rate"),
            (CheckCategory::Rowcount, "row_count"),
        ]
    );

    let join = &checks[4];
    assert_eq!(join.metadata["parent"], "stg_users");
    assert_eq!(join.metadata["join_cols"], json!(["user_id"]));
    assert!(join.sql.contains("LEFT JOIN DEV_DB.staging.stg_users p ON c.user_id = p.user_id"));
}

#[test]
fn join_key_override_takes_precedence() {
    let graph = graph();
    let mut overrides = JoinKeyOverrides::new();
    overrides.insert(
        "fact_orders".to_string(),
        BTreeMap::from([("stg_users".to_string(), vec!["user_id".to_string(), "email".to_string()])]),
    );
    overrides.insert(
        "dim_user_summary".to_string(),
        BTreeMap::from([("fact_orders".to_string(), vec!["user_id".to_string()])]),
    );

    let join = [CheckCategory::Join];
    let checks = generate_checks(&graph, &["fact_orders", "dim_user_summary"], Some(&join), &overrides);
    assert_eq!(checks.len(), 2);

    assert_eq!(checks[0].model, "fact_orders");
    assert_eq!(checks[0].metadata["join_cols"], json!(["user_id", "email"]));
    assert!(checks[0].sql.contains("ON c.user_id = p.user_id AND c.email = p.email"));

    // No inferable key: fact_orders is unique on order_id, which dim_user_summary lacks
    assert_eq!(checks[1].model, "dim_user_summary");
    assert_eq!(checks[1].metadata["parent"], "fact_orders");

    let inferred = generate_checks(&graph, &["dim_user_summary"], Some(&join), &JoinKeyOverrides::new());
    assert!(inferred.is_empty());
}

#[test]
fn accepted_values_round_trip_through_sql() {
    let mut manifest: Value =
        serde_json::from_str(&std::fs::read_to_string(fixture_manifest_path()).unwrap()).unwrap();
    let expected = vec!["pending", "it's", "a, b", "x)", "''"];
    manifest["nodes"]["test.test_project.accepted_values_fact_orders_status.93e1c5"]["test_metadata"]["kwargs"]
        ["values"] = json!(expected);

    let manifest = Manifest::from_str(&manifest.to_string()).unwrap();
    let graph = ModelGraph::from_manifest(&manifest);
    let checks = CheckGenerator::new(&graph).generate(&["fact_orders"], Some(&[CheckCategory::Distribution]));

    let unexpected = checks
        .iter()
        .find(|c| c.check == CheckName::UnexpectedValues)
        .unwrap();

    assert_eq!(parse_not_in_list(&unexpected.sql), expected);
    assert_eq!(unexpected.metadata["expected_values"], json!(expected));
}

#[test]
fn unknown_models_generate_nothing() {
    let graph = graph();
    let checks = CheckGenerator::new(&graph).generate(&["brand_new_model"], None);
    assert!(checks.is_empty());
}

#[test]
fn plan_from_changed_files() {
    let graph = graph();
    let config = Config::default();
    let plan = ReviewPlan::from_changed_files(
        &graph,
        &config,
        &["models/staging/stg_users.sql", "README.md"],
        Some(&[CheckCategory::Rowcount]),
    );

    assert_eq!(plan.models, vec!["stg_users"]);
    assert_eq!(plan.model_ids, vec!["model.test_project.stg_users"]);
    assert_eq!(plan.blast_radius, vec!["dim_user_summary", "fact_orders"]);
    assert_eq!(plan.checks.len(), 1);
}

#[test]
fn review_end_to_end_with_recorded_results() {
    let graph = graph();
    let config = Config::default();
    let plan = ReviewPlan::new(&graph, &config, &["fact_orders"], None);
    assert_eq!(plan.checks.len(), 6);
    assert_eq!(plan.blast_radius, vec!["dim_user_summary"]);

    let mut executor = ReplayExecutor::default();
    for spec in &plan.checks {
        match spec.check {
            CheckName::PkDuplicates => {
                executor.record_rows(&spec.sql, rows(json!([{"TOTAL_ROWS": 1000, "DUPLICATE_COUNT": 3}])));
                executor.record_rows(
                    spec.sample_sql.as_deref().unwrap(),
                    rows(json!([{"ORDER_ID": 17, "OCCURRENCES": 4}])),
                );
            }
            CheckName::NullRate => {
                executor.record_rows(&spec.sql, rows(json!([{"TOTAL_ROWS": 1000, "NULL_COUNT": 0, "NULL_PCT": 0}])));
            }
            CheckName::ValueDistribution => {
                executor.record_rows(
                    &spec.sql,
                    rows(json!([
                        {"VALUE": "completed", "ROW_COUNT": 700, "PCT": 70.0},
                        {"VALUE": "pending", "ROW_COUNT": 250, "PCT": 25.0},
                        {"VALUE": "refunded", "ROW_COUNT": 50, "PCT": 5.0}
                    ])),
                );
            }
            CheckName::UnexpectedValues => {
                executor.record_rows(&spec.sql, rows(json!([{"UNEXPECTED_VALUE": "refunded", "ROW_COUNT": 50}])));
            }
            CheckName::FkMatchRate => {
                executor.record_error(&spec.sql, "Object 'DEV_DB.STAGING.STG_USERS' does not exist");
            }
            CheckName::RowCount => {
                executor.record_rows(&spec.sql, rows(json!([{"ROW_COUNT": 1000}])));
            }
            CheckName::Other(_) => unreachable!(),
        }
    }

    let report = ReviewRunner::new(&executor, config.thresholds).review(&plan);

    assert_eq!(report.summary.to_string(), "2 FAIL / 1 WARN / 3 PASS");
    assert!(report.has_failures());
    assert_eq!(report.models_reviewed, vec!["fact_orders"]);

    let statuses: Vec<(CheckStatus, &str)> = report
        .results
        .iter()
        .map(|r| (r.status, r.check.as_str()))
        .collect();
    assert_eq!(
        statuses,
        vec![
            (CheckStatus::Fail, "pk_duplicates"),
            (CheckStatus::Fail, "fk_match_rate"),
            (CheckStatus::Warn, "unexpected_values"),
            (CheckStatus::Pass, "null_rate"),
            (CheckStatus::Pass, "row_count"),
            (CheckStatus::Pass, "value_distribution"),
        ]
    );

    assert_eq!(report.results[0].detail, "3 duplicate order_id values out of 1,000 rows");
    assert_eq!(report.results[0].sample_data.as_ref().map(Vec::len), Some(1));
    assert_eq!(
        report.results[1].detail,
        "SQL error: Object 'DEV_DB.STAGING.STG_USERS' does not exist"
    );
    assert_eq!(report.results[2].detail, "1 unexpected value(s): 'refunded' (50 rows)");

    let reloaded = guardrail_core::ReviewReport::from_json(&report.to_json().unwrap()).unwrap();
    assert_eq!(reloaded, report);
}

#[test]
fn dry_run_review_skips_all_checks() {
    let graph = graph();
    let plan = ReviewPlan::new(&graph, &Config::default(), &["stg_users"], None);
    let report = ReviewRunner::dry_run().review(&plan);

    assert_eq!(report.summary.skip, plan.checks.len());
    assert!(!report.has_failures());
    assert!(report.results.iter().all(|r| r.detail == "Skipped (dry-run mode)"));
}
