//! Model graph construction and lookups
//!
//! Extracts model metadata (columns, declared column tests, edges) from a
//! parsed manifest. The graph is immutable after construction.

use std::collections::{BTreeMap, HashMap};
use crate::blast::compute_blast_radius;
use crate::manifest::{is_model_id, is_test_id, Manifest, ManifestNode};

/// Node identifier (unique_id from manifest)
pub type NodeId = String;

/// A materialized dbt model and its declared column tests
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Unique identifier (e.g., "model.my_project.users")
    pub unique_id: NodeId,

    /// Model name (e.g., "users")
    pub name: String,

    /// Source file path, relative to the project root
    pub original_file_path: String,

    /// Fully qualified storage location
    pub relation_name: String,

    pub database: String,

    pub schema: String,

    /// Storage kind (table, view, incremental, ...)
    pub materialized: String,

    /// Column names in declaration order
    pub columns: Vec<String>,

    pub tags: Vec<String>,

    /// Columns with a `unique` test, in declaration order
    pub unique_tests: Vec<String>,

    /// Columns with a `not_null` test, in declaration order
    pub not_null_tests: Vec<String>,

    /// Columns with an `accepted_values` test and their allowed values, in
    /// declaration order
    pub accepted_values_tests: Vec<(String, Vec<String>)>,

    /// Models this model reads from
    pub depends_on_models: Vec<NodeId>,

    /// Models that read from this model
    pub child_models: Vec<NodeId>,

    /// Uncompiled model source
    pub raw_code: String,
}

impl Model {
    /// Whether the model declares a column
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Allowed values of a column's `accepted_values` test
    pub fn accepted_values(&self, column: &str) -> Option<&[String]> {
        self.accepted_values_tests
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, values)| values.as_slice())
    }
}

/// Models of a manifest plus the raw child adjacency used for traversal
#[derive(Debug, Clone)]
pub struct ModelGraph {
    /// Models keyed by unique_id (sorted, so name scans are deterministic)
    models: BTreeMap<NodeId, Model>,

    /// original_file_path -> unique_id
    file_index: HashMap<String, NodeId>,

    /// Raw child adjacency, including non-model dependents such as tests
    children: HashMap<NodeId, Vec<NodeId>>,

    /// Raw parent adjacency
    parents: HashMap<NodeId, Vec<NodeId>>,

    test_count: usize,
}

impl ModelGraph {
    /// Build the model graph from a manifest
    ///
    /// Each direction comes from the manifest's parent_map/child_map when
    /// present and is otherwise inverted from the other one. Only when both
    /// maps are missing are edges derived from each node's `depends_on`.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let (parents, children) = adjacency(manifest);

        let mut file_index = HashMap::new();
        let mut models = BTreeMap::new();

        for (node_id, node) in &manifest.nodes {
            if !is_model_id(node_id) {
                continue;
            }

            file_index.insert(node.original_file_path.clone(), node_id.clone());
            let model = extract_model(node_id, node, manifest, &parents, &children);
            models.insert(node_id.clone(), model);
        }

        tracing::debug!(
            models = models.len(),
            tests = manifest.test_count(),
            "built model graph"
        );

        Self {
            models,
            file_index,
            children,
            parents,
            test_count: manifest.test_count(),
        }
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn test_count(&self) -> usize {
        self.test_count
    }

    /// Get a model by unique_id
    pub fn get_model(&self, unique_id: &str) -> Option<&Model> {
        self.models.get(unique_id)
    }

    /// Get a model by name (linear scan)
    pub fn get_model_by_name(&self, name: &str) -> Option<&Model> {
        self.models.values().find(|m| m.name == name)
    }

    /// Map a project-relative file path to a model unique_id
    pub fn resolve_file_path(&self, file_path: &str) -> Option<&NodeId> {
        self.file_index.get(file_path)
    }

    /// Map changed file paths to model ids
    ///
    /// Returns the resolved ids and the paths with no compiled model, which
    /// usually belong to models added since the last `dbt compile`.
    pub fn resolve_changed_files<S: AsRef<str>>(&self, paths: &[S]) -> (Vec<NodeId>, Vec<String>) {
        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();

        for path in paths {
            let path = path.as_ref();
            match self.resolve_file_path(path) {
                Some(id) => resolved.push(id.clone()),
                None => unresolved.push(path.to_string()),
            }
        }

        (resolved, unresolved)
    }

    /// Iterate all models, sorted by unique_id
    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    /// Raw child adjacency (includes tests and other non-model dependents)
    pub fn child_map(&self) -> &HashMap<NodeId, Vec<NodeId>> {
        &self.children
    }

    /// Immediate parents of a node, any resource type
    pub fn parents(&self, node_id: &str) -> &[NodeId] {
        self.parents.get(node_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Immediate children of a node, any resource type
    pub fn children(&self, node_id: &str) -> &[NodeId] {
        self.children.get(node_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Models downstream of `seeds`, sorted by unique_id
    pub fn blast_radius<S: AsRef<str>>(&self, seeds: &[S], max_depth: usize) -> Vec<NodeId> {
        compute_blast_radius(&self.children, seeds, max_depth)
    }

    /// Names of the models downstream of `seeds`, in unique_id order
    pub fn blast_radius_names<S: AsRef<str>>(&self, seeds: &[S], max_depth: usize) -> Vec<String> {
        self.blast_radius(seeds, max_depth)
            .iter()
            .filter_map(|id| self.get_model(id))
            .map(|m| m.name.clone())
            .collect()
    }
}

type Adjacency = HashMap<NodeId, Vec<NodeId>>;

fn adjacency(manifest: &Manifest) -> (Adjacency, Adjacency) {
    let parents = &manifest.parent_map;
    let children = &manifest.child_map;

    match (parents.is_empty(), children.is_empty()) {
        (false, false) => (parents.clone(), children.clone()),
        (false, true) => (parents.clone(), invert(parents)),
        (true, false) => (invert(children), children.clone()),
        (true, true) => {
            let parents = depends_on_parents(manifest);
            let children = invert(&parents);
            (parents, children)
        }
    }
}

/// Reverse every edge, visiting sources in sorted order
fn invert(edges: &Adjacency) -> Adjacency {
    let mut sources: Vec<&NodeId> = edges.keys().collect();
    sources.sort();

    let mut inverted: Adjacency = HashMap::new();
    for source in sources {
        for target in &edges[source] {
            inverted
                .entry(target.clone())
                .or_default()
                .push(source.clone());
        }
    }
    inverted
}

fn depends_on_parents(manifest: &Manifest) -> Adjacency {
    manifest
        .nodes
        .iter()
        .filter(|(_, node)| !node.depends_on.nodes.is_empty())
        .map(|(id, node)| (id.clone(), node.depends_on.nodes.clone()))
        .collect()
}

fn extract_model(
    node_id: &str,
    node: &ManifestNode,
    manifest: &Manifest,
    parents: &Adjacency,
    children: &Adjacency,
) -> Model {
    let direct_children = children.get(node_id).map(Vec::as_slice).unwrap_or_default();

    let depends_on_models = parents
        .get(node_id)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter(|id| is_model_id(id))
        .cloned()
        .collect();

    let child_models = direct_children
        .iter()
        .filter(|id| is_model_id(id))
        .cloned()
        .collect();

    let mut model = Model {
        unique_id: node_id.to_string(),
        name: node.name.clone(),
        original_file_path: node.original_file_path.clone(),
        relation_name: node.relation_name.clone().unwrap_or_default(),
        database: node.database.clone().unwrap_or_default(),
        schema: node.schema.clone().unwrap_or_default(),
        materialized: node.config.materialized.clone().unwrap_or_default(),
        columns: node.columns.keys().cloned().collect(),
        tags: node.tags.clone(),
        unique_tests: Vec::new(),
        not_null_tests: Vec::new(),
        accepted_values_tests: Vec::new(),
        depends_on_models,
        child_models,
        raw_code: node.raw_code.clone(),
    };

    extract_tests(&mut model, direct_children, manifest);
    model
}

/// Collect unique / not_null / accepted_values tests attached to a model
///
/// Tests without a target column (model-level tests) are skipped; only
/// single-column tests translate into checks.
fn extract_tests(model: &mut Model, direct_children: &[NodeId], manifest: &Manifest) {
    for child_id in direct_children.iter().filter(|id| is_test_id(id)) {
        let Some(test_node) = manifest.get_node(child_id) else {
            continue;
        };
        let Some(test_meta) = &test_node.test_metadata else {
            continue;
        };

        let column = match test_node.column_name.as_deref() {
            Some(column) if !column.is_empty() => column.to_string(),
            _ => {
                tracing::debug!(test = %child_id, model = %model.name, "skipping test without a target column");
                continue;
            }
        };

        match test_meta.name.as_str() {
            "unique" => model.unique_tests.push(column),
            "not_null" => model.not_null_tests.push(column),
            "accepted_values" => {
                let values = test_meta.accepted_values();
                if values.is_empty() {
                    continue;
                }
                // A later test on the same column replaces the earlier one
                match model.accepted_values_tests.iter_mut().find(|(c, _)| *c == column) {
                    Some((_, existing)) => *existing = values,
                    None => model.accepted_values_tests.push((column, values)),
                }
            }
            _ => {}
        }
    }
}
