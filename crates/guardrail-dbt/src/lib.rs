//! dbt artifact parsing and model graph construction
//!
//! This crate handles:
//! - Parsing manifest.json (dbt-generated artifacts)
//! - Extracting models and their declared column tests
//! - Mapping changed files back to models
//! - Impact analysis (blast radius of changed models)

pub mod manifest;
pub mod graph;
pub mod blast;

pub use manifest::{Manifest, ManifestError, ManifestNode, ManifestMetadata, NodeConfig, DependsOn, TestMetadata, is_model_id, is_test_id};
pub use graph::{Model, ModelGraph, NodeId};
pub use blast::{compute_blast_radius, DEFAULT_MAX_DEPTH};
