//! Decomposition
//!
//! Keyword/regex-driven decomposition of free-text instructions into a task
//! graph: template scoring, parameter resolution, dependency inference and
//! topological ordering.

pub mod dependencies;
pub mod graph;
pub mod parameters;
pub mod planner;
pub mod scoring;

pub use dependencies::{infer_dependencies, upstream_types, EXTRACTED_FIELD};
pub use graph::{order_tasks, validate_plan, PlanValidation};
pub use parameters::{clause_for, resolve_parameters, split_clauses};
pub use planner::{decompose, derive_goal, DecompositionConstraints, Planner};
pub use scoring::{match_templates, Signals, TemplateMatch, MATCH_THRESHOLD};
