//! Review orchestration
//!
//! Resolves the models under review, computes their blast radius,
//! generates checks, runs them through a `QueryExecutor`, and evaluates
//! the rows. Query execution itself is delegated; nothing here talks to a
//! warehouse.

use std::time::Instant;
use guardrail_core::{sort_results, CheckCategory, CheckResult, CheckSpec, Config, ReviewReport, Row, Thresholds};
use guardrail_dbt::{ModelGraph, NodeId};
use crate::evaluator::evaluate_check;
use crate::generator::CheckGenerator;

/// Errors reported by a query executor
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("{0}")]
    Query(String),

    #[error("no recorded result for query: {0}")]
    UnknownQuery(String),

    #[error("failed to load recorded results from {0}: {1}")]
    Load(String, String),
}

/// Runs SQL against a warehouse and returns rows
pub trait QueryExecutor {
    /// Short name for logs (e.g. "snowflake", "replay")
    fn name(&self) -> &str;

    /// Execute a query and return all rows
    fn execute(&self, sql: &str) -> Result<Vec<Row>, ExecutionError>;
}

/// What a review will check, before anything is executed
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewPlan {
    /// Names of models checks are generated for
    pub models: Vec<String>,

    /// unique_ids of the reviewed models present in the manifest
    pub model_ids: Vec<NodeId>,

    /// Names of models downstream of the reviewed models
    pub blast_radius: Vec<String>,

    pub checks: Vec<CheckSpec>,
}

impl ReviewPlan {
    /// Plan a review of `model_names`
    ///
    /// Names missing from the manifest stay in `models` (they may be new
    /// files) but contribute no checks and no blast radius.
    pub fn new<S: AsRef<str>>(
        graph: &ModelGraph,
        config: &Config,
        model_names: &[S],
        categories: Option<&[CheckCategory]>,
    ) -> Self {
        let models: Vec<String> = model_names.iter().map(|n| n.as_ref().to_string()).collect();

        let model_ids: Vec<NodeId> = models
            .iter()
            .filter_map(|name| graph.get_model_by_name(name))
            .map(|m| m.unique_id.clone())
            .collect();

        let blast_radius = graph.blast_radius_names(&model_ids, config.max_depth);

        let default_categories = config.default_categories();
        let categories = categories.unwrap_or(&default_categories);
        let checks = CheckGenerator::from_config(graph, config).generate(&models, Some(categories));

        Self {
            models,
            model_ids,
            blast_radius,
            checks,
        }
    }

    /// Plan a review of the models behind changed file paths
    ///
    /// Paths with no compiled model are ignored.
    pub fn from_changed_files<S: AsRef<str>>(
        graph: &ModelGraph,
        config: &Config,
        paths: &[S],
        categories: Option<&[CheckCategory]>,
    ) -> Self {
        let (ids, unresolved) = graph.resolve_changed_files(paths);
        for path in &unresolved {
            tracing::debug!(path = %path, "changed file has no compiled model");
        }

        let names: Vec<String> = ids
            .iter()
            .filter_map(|id| graph.get_model(id))
            .map(|m| m.name.clone())
            .collect();

        Self::new(graph, config, &names, categories)
    }
}

/// Executes checks and evaluates their results
pub struct ReviewRunner<'a> {
    executor: Option<&'a dyn QueryExecutor>,
    thresholds: Thresholds,
}

impl<'a> ReviewRunner<'a> {
    /// Runner that executes queries through `executor`
    pub fn new(executor: &'a dyn QueryExecutor, thresholds: Thresholds) -> Self {
        Self {
            executor: Some(executor),
            thresholds,
        }
    }

    /// Runner that executes nothing and marks every check SKIP
    pub fn dry_run() -> Self {
        Self {
            executor: None,
            thresholds: Thresholds::default(),
        }
    }

    /// Execute and evaluate one check
    ///
    /// A failing primary query becomes a FAIL result. Drill-down rows are
    /// fetched only for FAIL/WARN results and only best-effort.
    pub fn run_check(&self, spec: &CheckSpec) -> CheckResult {
        let Some(executor) = self.executor else {
            return CheckResult::skipped(spec, "Skipped (dry-run mode)");
        };

        let rows = match executor.execute(&spec.sql) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(model = %spec.model, check = %spec.check, error = %e, "check query failed");
                return CheckResult::execution_error(spec, e);
            }
        };

        let result = evaluate_check(spec, &rows, &self.thresholds);

        match (&spec.sample_sql, result.wants_sample()) {
            (Some(sample_sql), true) => match executor.execute(sample_sql) {
                Ok(sample_rows) => result.with_sample_data(sample_rows),
                Err(e) => {
                    tracing::warn!(model = %spec.model, check = %spec.check, error = %e, "sample query failed");
                    result
                }
            },
            _ => result,
        }
    }

    /// Execute and evaluate every check, in order
    pub fn run(&self, checks: &[CheckSpec]) -> Vec<CheckResult> {
        checks.iter().map(|spec| self.run_check(spec)).collect()
    }

    /// Run a planned review and assemble its report, FAILs first
    pub fn review(&self, plan: &ReviewPlan) -> ReviewReport {
        let started = Instant::now();

        if let Some(executor) = self.executor {
            tracing::info!(
                executor = executor.name(),
                checks = plan.checks.len(),
                models = plan.models.len(),
                "running review"
            );
        }

        let mut results = self.run(&plan.checks);
        sort_results(&mut results);
        let report = ReviewReport::new(
            plan.models.clone(),
            plan.blast_radius.clone(),
            results,
            started.elapsed().as_secs_f64(),
        );

        tracing::info!(summary = %report.summary, "review finished");
        report
    }
}
