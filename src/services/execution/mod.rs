//! Execution
//!
//! Scheduling, dispatch, retry, lifecycle events and progress reporting for
//! plans produced by decomposition.

pub mod actions;
pub mod context;
pub mod engine;
pub mod events;
pub mod progress;
pub mod report;
pub mod runner;

pub use actions::synthesize_actions;
pub use context::ExecutionContext;
pub use engine::ExecutionEngine;
pub use events::{EventBus, EventHandler, EventKind, ExecutionEvent, ProgressListener};
pub use progress::{build_progress, ProgressSnapshot, ProgressStatus};
pub use report::{ExecutionReport, TaskOutcome};
pub use runner::{render_prompt, TaskRunner};
