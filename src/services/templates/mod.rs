//! Templates
//!
//! Planning templates, the task catalogue and pluggable parameter
//! extraction rules.

pub mod builtin;
pub mod extraction;
pub mod registry;
pub mod types;

pub use extraction::{detect_target_language, ExtractionContext, ExtractionRule, ExtractionRules, FnRule};
pub use registry::{TaskCatalogue, TemplateRegistry};
pub use types::{
    PageField, ParamSource, ParameterRule, ScoreBonus, Signal, TaskDefinition, TaskTemplate, TemplateKind,
};
