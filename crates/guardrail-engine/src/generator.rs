//! Check generation
//!
//! Translates model metadata (declared column tests, parent models) into
//! parametrized validation queries, one check family per requested
//! category.

use guardrail_core::config::{apply_schema_map, JoinKeyOverrides, SchemaMapping};
use guardrail_core::{CheckCategory, CheckName, CheckSpec, Config, Importance};
use guardrail_dbt::{Model, ModelGraph};
use serde_json::Value;
use crate::sql;

/// Generates `CheckSpec`s for models of a graph
#[derive(Debug, Clone, Copy)]
pub struct CheckGenerator<'a> {
    graph: &'a ModelGraph,
    join_keys: Option<&'a JoinKeyOverrides>,
    schema_map: &'a [SchemaMapping],
}

impl<'a> CheckGenerator<'a> {
    /// Generator with no join key overrides and no relation rewrites
    pub fn new(graph: &'a ModelGraph) -> Self {
        Self {
            graph,
            join_keys: None,
            schema_map: &[],
        }
    }

    /// Generator using the join keys and schema map of a config
    pub fn from_config(graph: &'a ModelGraph, config: &'a Config) -> Self {
        Self {
            graph,
            join_keys: Some(&config.join_keys),
            schema_map: &config.schema_map,
        }
    }

    /// Use explicit join columns for (child, parent) pairs
    pub fn with_join_keys(mut self, join_keys: &'a JoinKeyOverrides) -> Self {
        self.join_keys = Some(join_keys);
        self
    }

    /// Rewrite relation names before they are embedded in queries
    pub fn with_schema_map(mut self, schema_map: &'a [SchemaMapping]) -> Self {
        self.schema_map = schema_map;
        self
    }

    /// Generate checks for `model_names`
    ///
    /// `categories` defaults to all four. Names with no compiled model are
    /// skipped: callers routinely pass freshly added models.
    pub fn generate<S: AsRef<str>>(
        &self,
        model_names: &[S],
        categories: Option<&[CheckCategory]>,
    ) -> Vec<CheckSpec> {
        let categories = categories.unwrap_or(&CheckCategory::ALL);
        let mut checks = Vec::new();

        for name in model_names {
            let name = name.as_ref();
            let Some(model) = self.graph.get_model_by_name(name) else {
                tracing::debug!(model = name, "model not in manifest, skipping check generation");
                continue;
            };

            // Category families run in a fixed order regardless of request order
            for category in CheckCategory::ALL {
                if !categories.contains(&category) {
                    continue;
                }
                match category {
                    CheckCategory::Grain => checks.extend(self.grain_checks(model)),
                    CheckCategory::Distribution => checks.extend(self.distribution_checks(model)),
                    CheckCategory::Join => checks.extend(self.join_checks(model)),
                    CheckCategory::Rowcount => checks.push(self.rowcount_check(model)),
                }
            }
        }

        tracing::debug!(models = model_names.len(), checks = checks.len(), "generated checks");
        checks
    }

    fn relation(&self, model: &Model) -> String {
        apply_schema_map(self.schema_map, &model.relation_name)
    }

    /// pk_duplicates per unique-tested column, null_rate per not_null-tested column
    fn grain_checks(&self, model: &Model) -> Vec<CheckSpec> {
        let relation = self.relation(model);
        let mut checks = Vec::new();

        for column in &model.unique_tests {
            checks.push(
                CheckSpec::new(
                    CheckCategory::Grain,
                    &model.name,
                    CheckName::PkDuplicates,
                    sql::pk_duplicates(&relation, column),
                    Importance::Tier0,
                )
                .with_metadata("column", column.as_str())
                .with_sample_sql(sql::pk_duplicates_sample(&relation, column)),
            );
        }

        for column in &model.not_null_tests {
            let select_columns = sql::pick_sample_columns(&model.columns, column);
            checks.push(
                CheckSpec::new(
                    CheckCategory::Grain,
                    &model.name,
                    CheckName::NullRate,
                    sql::null_rate(&relation, column),
                    Importance::High,
                )
                .with_metadata("column", column.as_str())
                .with_sample_sql(sql::null_rate_sample(&relation, column, &select_columns)),
            );
        }

        checks
    }

    /// value_distribution and unexpected_values per accepted_values-tested column
    fn distribution_checks(&self, model: &Model) -> Vec<CheckSpec> {
        let relation = self.relation(model);
        let mut checks = Vec::new();

        for (column, expected) in &model.accepted_values_tests {
            let expected_json = Value::from(expected.clone());

            checks.push(
                CheckSpec::new(
                    CheckCategory::Distribution,
                    &model.name,
                    CheckName::ValueDistribution,
                    sql::value_distribution(&relation, column),
                    Importance::Normal,
                )
                .with_metadata("column", column.as_str())
                .with_metadata("expected_values", expected_json.clone()),
            );

            checks.push(
                CheckSpec::new(
                    CheckCategory::Distribution,
                    &model.name,
                    CheckName::UnexpectedValues,
                    sql::unexpected_values(&relation, column, expected),
                    Importance::High,
                )
                .with_metadata("column", column.as_str())
                .with_metadata("expected_values", expected_json),
            );
        }

        checks
    }

    /// fk_match_rate per direct parent model with resolvable join columns
    fn join_checks(&self, model: &Model) -> Vec<CheckSpec> {
        let relation = self.relation(model);
        let mut checks = Vec::new();

        for parent_id in &model.depends_on_models {
            let Some(parent) = self.graph.get_model(parent_id) else {
                continue;
            };

            let join_cols = self.join_columns(model, parent);
            let parent_relation = self.relation(parent);
            let queries = sql::fk_match_rate(&relation, &parent_relation, &parent.name, &join_cols)
                .zip(sql::fk_match_rate_sample(&relation, &parent_relation, &join_cols));

            let Some((check_sql, sample_sql)) = queries else {
                tracing::debug!(
                    model = %model.name,
                    parent = %parent.name,
                    "no join columns for parent, skipping join check"
                );
                continue;
            };

            checks.push(
                CheckSpec::new(
                    CheckCategory::Join,
                    &model.name,
                    CheckName::FkMatchRate,
                    check_sql,
                    Importance::Normal,
                )
                .with_metadata("parent", parent.name.as_str())
                .with_metadata("join_cols", Value::from(join_cols))
                .with_sample_sql(sample_sql),
            );
        }

        checks
    }

    /// Explicit override first, else parent unique-tested columns the child also has
    fn join_columns(&self, child: &Model, parent: &Model) -> Vec<String> {
        let override_cols = self
            .join_keys
            .and_then(|keys| keys.get(&child.name))
            .and_then(|parents| parents.get(&parent.name))
            .filter(|cols| !cols.is_empty());

        if let Some(cols) = override_cols {
            return cols.clone();
        }

        parent
            .unique_tests
            .iter()
            .filter(|c| child.has_column(c))
            .cloned()
            .collect()
    }

    fn rowcount_check(&self, model: &Model) -> CheckSpec {
        CheckSpec::new(
            CheckCategory::Rowcount,
            &model.name,
            CheckName::RowCount,
            sql::row_count(&self.relation(model)),
            Importance::Normal,
        )
    }
}

/// Generate checks for `model_names` with explicit join key overrides
pub fn generate_checks<S: AsRef<str>>(
    graph: &ModelGraph,
    model_names: &[S],
    categories: Option<&[CheckCategory]>,
    join_key_overrides: &JoinKeyOverrides,
) -> Vec<CheckSpec> {
    CheckGenerator::new(graph)
        .with_join_keys(join_key_overrides)
        .generate(model_names, categories)
}
