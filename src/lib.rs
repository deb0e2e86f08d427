//! Task Cascade - Rust Library
//!
//! Turns a free-text instruction into a dependency-ordered plan of text and
//! page-automation tasks and executes it. It includes:
//! - Template registry and keyword/regex decomposition
//! - Grounding of page targets against a page snapshot
//! - A scheduling engine with four policies, retries and cancellation
//! - Lifecycle events and progress snapshots
//!
//! Collaborators (text capability, page executor, snapshot provider) are
//! plugged in through the traits of `task-cascade-core`.

pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used items
pub use models::{
    DependencyCondition, EngineSettings, Plan, PlanConfig, PlanStatus, PlannedTask, SchedulingPolicy,
    SettingsUpdate, TaskDependency, TaskPriority, TaskResult, TaskStatus, TaskType,
};
pub use services::decomposition::{decompose, DecompositionConstraints, Planner};
pub use services::execution::{
    EventKind, ExecutionEngine, ExecutionEvent, ExecutionReport, ProgressSnapshot, TaskRunner,
};
pub use services::grounding::{resolve_locator, Locator};
pub use services::templates::{TaskCatalogue, TaskDefinition, TaskTemplate, TemplateRegistry};
pub use utils::error::{AppError, AppResult};

// Core types callers need to implement collaborators
pub use task_cascade_core::{
    ActionKind, ActionOutcome, CoreError, CoreResult, GroundedAction, PageActionExecutor, PageElement,
    PageSnapshot, ParamKind, ParamValue, ParameterSpec, SnapshotProvider, TextCapability, TextResponse,
};
