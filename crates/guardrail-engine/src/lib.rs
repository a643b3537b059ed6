//! Guardrail engine - check generation and evaluation
//!
//! This crate implements the review pipeline:
//! - Check generation from model metadata
//! - Result evaluation against thresholds
//! - Review orchestration over a pluggable query executor
//! - Reviewer context for changed models

pub mod format;
pub mod row;
pub mod sql;
pub mod generator;
pub mod evaluator;
pub mod runner;
pub mod replay;
pub mod context;

pub use generator::{generate_checks, CheckGenerator};
pub use evaluator::evaluate_check;
pub use runner::{ExecutionError, QueryExecutor, ReviewPlan, ReviewRunner};
pub use replay::ReplayExecutor;
pub use context::{load_last_review, results_path, ContextBuilder, ContextError, ModelContext};
pub use row::RowAccessor;
