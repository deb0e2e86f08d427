//! Data Models
//!
//! Plan, task and settings data structures.

pub mod plan;
pub mod settings;
pub mod task;

pub use plan::{Plan, PlanConfig, PlanStatus, SchedulingPolicy};
pub use settings::{EngineSettings, SettingsUpdate};
pub use task::{
    DependencyCondition, PlannedTask, TaskCategory, TaskDependency, TaskErrorKind, TaskPriority,
    TaskResult, TaskStatus, TaskType,
};
