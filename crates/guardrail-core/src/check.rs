//! Generated checks
//!
//! A `CheckSpec` is a generated, not-yet-executed validation query plus the
//! metadata needed to evaluate its result.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Free-form check metadata (column under test, parent model, join columns...)
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Check family a spec belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckCategory {
    /// Row identity: duplicate keys and nulls in key columns
    Grain,

    /// Accepted-values distribution
    Distribution,

    /// Foreign-key match rate against parent models
    Join,

    /// Relation is readable and non-empty
    Rowcount,
}

impl CheckCategory {
    /// All categories, in generation order
    pub const ALL: [CheckCategory; 4] = [
        CheckCategory::Grain,
        CheckCategory::Distribution,
        CheckCategory::Join,
        CheckCategory::Rowcount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grain => "grain",
            Self::Distribution => "distribution",
            Self::Join => "join",
            Self::Rowcount => "rowcount",
        }
    }
}

impl std::fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grain" => Ok(Self::Grain),
            "distribution" => Ok(Self::Distribution),
            "join" => Ok(Self::Join),
            "rowcount" => Ok(Self::Rowcount),
            other => Err(format!(
                "unknown check category '{}' (expected grain, distribution, join or rowcount)",
                other
            )),
        }
    }
}

/// Name of a specific check
///
/// The six known kinds are closed variants. Anything else round-trips
/// through `Other` so reports written by newer versions still load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CheckName {
    PkDuplicates,
    NullRate,
    ValueDistribution,
    UnexpectedValues,
    FkMatchRate,
    RowCount,
    Other(String),
}

impl CheckName {
    pub fn as_str(&self) -> &str {
        match self {
            Self::PkDuplicates => "pk_duplicates",
            Self::NullRate => "null_rate",
            Self::ValueDistribution => "value_distribution",
            Self::UnexpectedValues => "unexpected_values",
            Self::FkMatchRate => "fk_match_rate",
            Self::RowCount => "row_count",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for CheckName {
    fn from(name: String) -> Self {
        match name.as_str() {
            "pk_duplicates" => Self::PkDuplicates,
            "null_rate" => Self::NullRate,
            "value_distribution" => Self::ValueDistribution,
            "unexpected_values" => Self::UnexpectedValues,
            "fk_match_rate" => Self::FkMatchRate,
            "row_count" => Self::RowCount,
            _ => Self::Other(name),
        }
    }
}

impl From<&str> for CheckName {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<CheckName> for String {
    fn from(name: CheckName) -> Self {
        match name {
            CheckName::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for CheckName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Importance tier, used only for ordering and never for pass/fail logic
///
/// Variants are declared most important first so the derived `Ord` sorts
/// TIER0 ahead of HIGH ahead of NORMAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Importance {
    Tier0,
    High,
    Normal,
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tier0 => write!(f, "TIER0"),
            Self::High => write!(f, "HIGH"),
            Self::Normal => write!(f, "NORMAL"),
        }
    }
}

/// A generated validation query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSpec {
    /// Check family
    pub category: CheckCategory,

    /// Owning model name (not unique_id)
    pub model: String,

    /// Specific check
    pub check: CheckName,

    /// Primary query, evaluated by the evaluator
    pub sql: String,

    /// Ordering priority
    pub importance: Importance,

    /// Check-specific metadata
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: Metadata,

    /// Drill-down query surfacing offending rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_sql: Option<String>,
}

impl CheckSpec {
    pub fn new(
        category: CheckCategory,
        model: impl Into<String>,
        check: CheckName,
        sql: impl Into<String>,
        importance: Importance,
    ) -> Self {
        Self {
            category,
            model: model.into(),
            check,
            sql: sql.into(),
            importance,
            metadata: Metadata::new(),
            sample_sql: None,
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Attach a drill-down query
    pub fn with_sample_sql(mut self, sample_sql: impl Into<String>) -> Self {
        self.sample_sql = Some(sample_sql.into());
        self
    }

    /// Column under test, if the check targets a single column
    pub fn column(&self) -> Option<&str> {
        self.metadata.get("column").and_then(|v| v.as_str())
    }
}
