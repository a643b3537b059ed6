//! dbt manifest.json parsing
//!
//! Parses dbt-generated manifest.json to extract models, tests, and the
//! parent/child adjacency maps.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Namespace prefix of model node ids
pub const MODEL_PREFIX: &str = "model.";

/// Namespace prefix of test node ids
pub const TEST_PREFIX: &str = "test.";

/// Whether a node id names a model
pub fn is_model_id(node_id: &str) -> bool {
    node_id.starts_with(MODEL_PREFIX)
}

/// Whether a node id names a test
pub fn is_test_id(node_id: &str) -> bool {
    node_id.starts_with(TEST_PREFIX)
}

/// dbt manifest.json structure (subset of fields we care about)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Metadata about the manifest
    #[serde(default)]
    pub metadata: ManifestMetadata,

    /// Model and test nodes
    #[serde(default)]
    pub nodes: HashMap<String, ManifestNode>,

    /// Parent map (node -> list of parent nodes)
    #[serde(default)]
    pub parent_map: HashMap<String, Vec<String>>,

    /// Child map (node -> list of child nodes)
    #[serde(default)]
    pub child_map: HashMap<String, Vec<String>>,
}

impl Manifest {
    /// Location of the compiled manifest inside a dbt project
    pub fn path_in_project(project_dir: &Path) -> PathBuf {
        project_dir.join("target").join("manifest.json")
    }

    /// Load `target/manifest.json` from a dbt project directory
    pub fn load_from_project(project_dir: &Path) -> Result<Self, ManifestError> {
        Self::from_file(&Self::path_in_project(project_dir))
    }

    /// Load manifest from file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        if !path.exists() {
            return Err(ManifestError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ManifestError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_str(&contents)
    }

    /// Parse manifest from JSON string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(json)
            .map_err(|e| ManifestError::ParseError(e.to_string()))
    }

    /// Get a specific node by unique_id
    pub fn get_node(&self, unique_id: &str) -> Option<&ManifestNode> {
        self.nodes.get(unique_id)
    }

    /// Number of model nodes
    pub fn model_count(&self) -> usize {
        self.nodes.keys().filter(|id| is_model_id(id)).count()
    }

    /// Number of test nodes
    pub fn test_count(&self) -> usize {
        self.nodes.keys().filter(|id| is_test_id(id)).count()
    }
}

/// Manifest metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    #[serde(default)]
    pub dbt_schema_version: String,
    #[serde(default)]
    pub dbt_version: String,
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub invocation_id: Option<String>,
}

/// A node in the manifest (model, test, seed, snapshot, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestNode {
    /// Unique identifier (e.g., "model.my_project.users")
    #[serde(default)]
    pub unique_id: String,

    /// Node name (e.g., "users")
    #[serde(default)]
    pub name: String,

    /// Resource type (model, test, snapshot, etc.)
    #[serde(default)]
    pub resource_type: String,

    /// Original file path, relative to the project root
    #[serde(default)]
    pub original_file_path: String,

    /// Fully qualified relation (e.g. "DEV_DB.marts.fact_orders")
    #[serde(default)]
    pub relation_name: Option<String>,

    #[serde(default)]
    pub database: Option<String>,

    #[serde(default)]
    pub schema: Option<String>,

    /// Node configuration
    #[serde(default)]
    pub config: NodeConfig,

    /// Column definitions, in declaration order
    #[serde(default)]
    pub columns: serde_json::Map<String, serde_json::Value>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Dependencies
    #[serde(default)]
    pub depends_on: DependsOn,

    /// Uncompiled model source
    #[serde(default)]
    pub raw_code: String,

    /// Generic test metadata (test nodes only)
    #[serde(default)]
    pub test_metadata: Option<TestMetadata>,

    /// Column a generic test targets (test nodes only)
    #[serde(default)]
    pub column_name: Option<String>,
}

/// Node configuration (from dbt_project.yml or model config)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Materialization type
    #[serde(default)]
    pub materialized: Option<String>,
}

/// Dependencies structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependsOn {
    /// List of node unique_ids this node depends on
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Generic test declaration (unique, not_null, accepted_values, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestMetadata {
    /// Test kind
    #[serde(default)]
    pub name: String,

    /// Test arguments (e.g. `values` for accepted_values)
    #[serde(default)]
    pub kwargs: serde_json::Map<String, serde_json::Value>,
}

impl TestMetadata {
    /// Declared value list of an accepted_values test, stringified
    pub fn accepted_values(&self) -> Vec<String> {
        match self.kwargs.get("values") {
            Some(serde_json::Value::Array(values)) => values
                .iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Manifest parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest.json not found at {}. Run `dbt compile` or `dbt build` first.", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read manifest file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse manifest JSON: {0}")]
    ParseError(String),
}
