//! Configuration schema (guardrail.toml)

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::path::{Path, PathBuf};
use crate::check::CheckCategory;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "GUARDRAIL_CONFIG";

/// Config file name looked up in the user config dir and the working directory
pub const CONFIG_FILE_NAME: &str = "guardrail.toml";

/// Numeric cutoffs used by the evaluator, each a ratio in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Null rate strictly above this fails
    pub null_rate_fail: f64,

    /// Null rate strictly above this warns
    pub null_rate_warn: f64,

    /// FK match rate strictly below this fails
    pub fk_match_rate_fail: f64,

    /// FK match rate strictly below this warns
    pub fk_match_rate_warn: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            null_rate_fail: 0.05,
            null_rate_warn: 0.001,
            fk_match_rate_fail: 0.95,
            fk_match_rate_warn: 0.99,
        }
    }
}

impl Thresholds {
    /// Reject ratios outside [0, 1] and inverted warn/fail pairs
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("null_rate_fail", self.null_rate_fail),
            ("null_rate_warn", self.null_rate_warn),
            ("fk_match_rate_fail", self.fk_match_rate_fail),
            ("fk_match_rate_warn", self.fk_match_rate_warn),
        ];

        for (name, value) in fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "thresholds.{} must be between 0 and 1, got {}",
                    name, value
                )));
            }
        }

        if self.null_rate_warn > self.null_rate_fail {
            return Err(ConfigError::Invalid(format!(
                "thresholds.null_rate_warn ({}) must not exceed null_rate_fail ({})",
                self.null_rate_warn, self.null_rate_fail
            )));
        }

        if self.fk_match_rate_fail > self.fk_match_rate_warn {
            return Err(ConfigError::Invalid(format!(
                "thresholds.fk_match_rate_fail ({}) must not exceed fk_match_rate_warn ({})",
                self.fk_match_rate_fail, self.fk_match_rate_warn
            )));
        }

        Ok(())
    }
}

/// Join key overrides: child model name -> parent model name -> join columns
pub type JoinKeyOverrides = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Rewrites a schema fragment inside relation names
///
/// Compiled relation names sometimes point at schemas a read-only role
/// cannot access; mappings bridge that gap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMapping {
    pub from: String,
    pub to: String,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// dbt project root (contains target/manifest.json)
    #[serde(default)]
    pub dbt_project_dir: String,

    /// Branch changed files are diffed against
    #[serde(default = "default_base_branch")]
    pub base_branch: String,

    /// Evaluation thresholds
    #[serde(default)]
    pub thresholds: Thresholds,

    /// Explicit join columns for join checks
    #[serde(default)]
    pub join_keys: JoinKeyOverrides,

    /// Relation name rewrites, first match wins
    #[serde(default)]
    pub schema_map: Vec<SchemaMapping>,

    /// Default category selection (all categories when absent)
    #[serde(default)]
    pub categories: Option<Vec<CheckCategory>>,

    /// Blast radius depth bound
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_max_depth() -> usize {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dbt_project_dir: String::new(),
            base_branch: default_base_branch(),
            thresholds: Thresholds::default(),
            join_keys: JoinKeyOverrides::new(),
            schema_map: Vec::new(),
            categories: None,
            max_depth: default_max_depth(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.dbt_project_dir = expand_path(&config.dbt_project_dir);
        config.thresholds.validate()?;

        Ok(config)
    }

    /// Load config from `path`, or defaults when no file is there
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::from_file(path)
            }
            Some(path) => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Categories to generate when the caller does not pick any
    pub fn default_categories(&self) -> Vec<CheckCategory> {
        self.categories
            .clone()
            .unwrap_or_else(|| CheckCategory::ALL.to_vec())
    }

    /// Apply the first matching schema mapping to a relation name
    pub fn map_relation(&self, relation_name: &str) -> String {
        apply_schema_map(&self.schema_map, relation_name)
    }
}

/// Apply the first schema mapping whose `from` occurs in `relation_name`
pub fn apply_schema_map(schema_map: &[SchemaMapping], relation_name: &str) -> String {
    for mapping in schema_map {
        if !mapping.from.is_empty() && relation_name.contains(&mapping.from) {
            return relation_name.replace(&mapping.from, &mapping.to);
        }
    }
    relation_name.to_string()
}

/// Locate a config file: `GUARDRAIL_CONFIG`, then the user config dir,
/// then the working directory
pub fn find_config_path() -> Option<PathBuf> {
    let env_path = std::env::var(CONFIG_ENV_VAR).ok();
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let cwd = std::env::current_dir().ok();

    find_config_path_in(env_path.as_deref(), home.as_deref(), cwd.as_deref())
}

fn find_config_path_in(env_path: Option<&str>, home: Option<&Path>, cwd: Option<&Path>) -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(env_path) = env_path.filter(|p| !p.is_empty()) {
        candidates.push(PathBuf::from(expand_path(env_path)));
    }
    if let Some(home) = home {
        candidates.push(home.join(".config").join("guardrail").join(CONFIG_FILE_NAME));
    }
    if let Some(cwd) = cwd {
        candidates.push(cwd.join(CONFIG_FILE_NAME));
    }

    candidates.into_iter().find(|p| p.exists())
}

/// Expand a leading `~` and `$VAR` / `${VAR}` references
///
/// Unset variables are left untouched.
pub fn expand_path(value: &str) -> String {
    let home = std::env::var("HOME").ok();
    expand_with(value, home.as_deref(), |name| std::env::var(name).ok())
}

fn expand_with(value: &str, home: Option<&str>, lookup: impl Fn(&str) -> Option<String>) -> String {
    let value = match (value.strip_prefix('~'), home) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            format!("{}{}", home, rest)
        }
        _ => value.to_string(),
    };

    env_var_pattern().replace_all(&value, |caps: &regex::Captures<'_>| {
        let name = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()).unwrap_or_default();
        lookup(name).unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .unwrap_or_else(|_| unreachable!())
    })
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
