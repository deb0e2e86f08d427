//! Services
//!
//! Planning and execution services. Decomposition turns an instruction into
//! a plan, grounding binds page targets, execution drives the plan.

pub mod decomposition;
pub mod execution;
pub mod grounding;
pub mod templates;

pub use decomposition::{DecompositionConstraints, Planner};
pub use execution::{ExecutionEngine, ExecutionReport, TaskRunner};
pub use templates::{TaskCatalogue, TemplateRegistry};
