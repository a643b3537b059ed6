//! Model context
//!
//! Everything a reviewer needs next to a changed model: the models it reads
//! from (with the relations they map to), the models reading from it, and
//! whatever the last saved review said about it. Files added since the last
//! `dbt compile` get a best-effort context built from their `ref()` calls.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use guardrail_core::{CheckResult, Config, ReviewReport};
use guardrail_dbt::{Model, ModelGraph};
use regex::Regex;
use serde::Serialize;

/// Errors loading the saved review
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("failed to read {0}: {1}")]
    Io(String, #[source] std::io::Error),

    #[error("invalid review report at {0}: {1}")]
    Report(String, #[source] serde_json::Error),
}

/// Reviewer context for a single model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelContext {
    pub name: String,

    /// Source file path, relative to the project root
    pub file_path: String,

    /// Schema-mapped relation; `None` until the model is materialized
    pub relation_name: Option<String>,

    pub raw_code: String,

    pub columns: Vec<String>,

    /// Names of the models this model reads from
    pub upstream: Vec<String>,

    /// Upstream model name -> schema-mapped relation
    pub upstream_tables: BTreeMap<String, String>,

    /// Names of the models reading directly from this one
    pub downstream: Vec<String>,

    /// Results for this model from the last saved review
    pub prior_results: Vec<CheckResult>,

    /// Not yet in the manifest
    pub is_new: bool,
}

/// Where a review report is saved inside a dbt project
pub fn results_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".guardrail").join("results.json")
}

/// Load the last saved review of a project, if there is one
pub fn load_last_review(project_dir: &Path) -> Result<Option<ReviewReport>, ContextError> {
    let path = results_path(project_dir);
    if !path.exists() {
        return Ok(None);
    }

    let display = path.display().to_string();
    let contents = std::fs::read_to_string(&path).map_err(|e| ContextError::Io(display.clone(), e))?;
    let report = ReviewReport::from_json(&contents).map_err(|e| ContextError::Report(display, e))?;

    Ok(Some(report))
}

/// Model names referenced through `{{ ref('...') }}`, first occurrence order
pub fn extract_refs(sql: &str) -> Vec<String> {
    let mut refs: Vec<String> = Vec::new();
    for caps in ref_pattern().captures_iter(sql) {
        let name = &caps[1];
        if !refs.iter().any(|r| r == name) {
            refs.push(name.to_string());
        }
    }
    refs
}

fn ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"\{\{\s*ref\(\s*['"](\w+)['"]\s*\)\s*\}\}"#).unwrap_or_else(|_| unreachable!())
    })
}

/// Builds `ModelContext`s against one graph and one saved review
pub struct ContextBuilder<'a> {
    graph: &'a ModelGraph,
    config: &'a Config,
    project_dir: PathBuf,
    last_review: Option<ReviewReport>,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(graph: &'a ModelGraph, config: &'a Config, project_dir: &Path) -> Self {
        Self {
            graph,
            config,
            project_dir: project_dir.to_path_buf(),
            last_review: None,
        }
    }

    /// Use `report` as the source of prior results
    pub fn with_last_review(mut self, report: Option<ReviewReport>) -> Self {
        self.last_review = report;
        self
    }

    /// Read prior results from the project's saved review
    pub fn load_last_review(self) -> Result<Self, ContextError> {
        let report = load_last_review(&self.project_dir)?;
        Ok(self.with_last_review(report))
    }

    /// Context for a compiled model, by name
    pub fn model(&self, name: &str) -> Option<ModelContext> {
        self.graph.get_model_by_name(name).map(|m| self.compiled(m))
    }

    /// Contexts for the named models; unknown names are skipped
    pub fn models<S: AsRef<str>>(&self, names: &[S]) -> Vec<ModelContext> {
        names
            .iter()
            .filter_map(|name| {
                let context = self.model(name.as_ref());
                if context.is_none() {
                    tracing::debug!(model = name.as_ref(), "model not in manifest, no context");
                }
                context
            })
            .collect()
    }

    /// Contexts for the models behind changed files
    ///
    /// SQL files without a compiled model are treated as new models; any
    /// other unresolved path is ignored.
    pub fn changed_files<S: AsRef<str>>(&self, paths: &[S]) -> Vec<ModelContext> {
        let (ids, unresolved) = self.graph.resolve_changed_files(paths);

        let compiled = ids
            .iter()
            .filter_map(|id| self.graph.get_model(id))
            .map(|m| self.compiled(m));

        let new = unresolved
            .iter()
            .filter(|path| Path::new(path).extension().is_some_and(|ext| ext == "sql"))
            .map(|path| self.new_file(path));

        compiled.chain(new).collect()
    }

    /// Context for a model file missing from the manifest
    ///
    /// The name is the file stem and upstream models come from the file's
    /// `ref()` calls, keeping only models the graph knows.
    pub fn new_file(&self, file_path: &str) -> ModelContext {
        let path = Path::new(file_path);
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let full_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        };
        let raw_code = match std::fs::read_to_string(&full_path) {
            Ok(code) => code,
            Err(e) => {
                tracing::debug!(path = %full_path.display(), error = %e, "cannot read new model file");
                String::new()
            }
        };

        let upstream_models: Vec<&Model> = extract_refs(&raw_code)
            .iter()
            .filter_map(|name| self.graph.get_model_by_name(name))
            .collect();

        ModelContext {
            prior_results: self.prior_results(&name),
            name,
            file_path: file_path.to_string(),
            relation_name: None,
            raw_code,
            columns: Vec::new(),
            upstream: upstream_models.iter().map(|m| m.name.clone()).collect(),
            upstream_tables: self.upstream_tables(&upstream_models),
            downstream: Vec::new(),
            is_new: true,
        }
    }

    fn compiled(&self, model: &Model) -> ModelContext {
        let upstream_models: Vec<&Model> = model
            .depends_on_models
            .iter()
            .filter_map(|id| self.graph.get_model(id))
            .collect();

        let downstream = model
            .child_models
            .iter()
            .filter_map(|id| self.graph.get_model(id))
            .map(|m| m.name.clone())
            .collect();

        ModelContext {
            name: model.name.clone(),
            file_path: model.original_file_path.clone(),
            relation_name: Some(self.config.map_relation(&model.relation_name)),
            raw_code: model.raw_code.clone(),
            columns: model.columns.clone(),
            upstream: upstream_models.iter().map(|m| m.name.clone()).collect(),
            upstream_tables: self.upstream_tables(&upstream_models),
            downstream,
            prior_results: self.prior_results(&model.name),
            is_new: false,
        }
    }

    fn upstream_tables(&self, models: &[&Model]) -> BTreeMap<String, String> {
        models
            .iter()
            .map(|m| (m.name.clone(), self.config.map_relation(&m.relation_name)))
            .collect()
    }

    fn prior_results(&self, model_name: &str) -> Vec<CheckResult> {
        self.last_review
            .iter()
            .flat_map(|report| &report.results)
            .filter(|r| r.model == model_name)
            .cloned()
            .collect()
    }
}
