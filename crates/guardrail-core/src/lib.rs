//! Guardrail Core
//!
//! Core domain model shared by every guardrail crate.
//! Check names and statuses are serialized into review reports - treat
//! their string forms as part of the public API.

pub mod check;
pub mod result;
pub mod config;
pub mod report;

pub use check::{CheckCategory, CheckName, CheckSpec, Importance, Metadata};
pub use result::{CheckResult, CheckStatus, Row};
pub use config::{Config, ConfigError, Thresholds, JoinKeyOverrides, SchemaMapping, apply_schema_map, find_config_path};
pub use report::{ReviewReport, ReviewSummary, ReportVersion, sort_results};
