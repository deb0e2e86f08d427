//! Execution Events
//!
//! Typed lifecycle events and a synchronous event bus. Handlers run in
//! registration order; a failing handler is logged and skipped, it never
//! aborts execution.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::progress::ProgressSnapshot;
use crate::models::task::PlannedTask;

/// Kind of lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PlanStarted,
    TaskStarted,
    TaskRetry,
    TaskCompleted,
    TaskFailed,
    PlanCompleted,
    PlanFailed,
    PlanCancelled,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::PlanStarted => "plan_started",
            EventKind::TaskStarted => "task_started",
            EventKind::TaskRetry => "task_retry",
            EventKind::TaskCompleted => "task_completed",
            EventKind::TaskFailed => "task_failed",
            EventKind::PlanCompleted => "plan_completed",
            EventKind::PlanFailed => "plan_failed",
            EventKind::PlanCancelled => "plan_cancelled",
        };
        write!(f, "{}", name)
    }
}

/// A lifecycle event with the progress at the time it was raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionEvent {
    pub kind: EventKind,
    pub plan_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    /// Retry counter after the increment (task_retry only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    /// Backoff before the retry (task_retry only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub progress: ProgressSnapshot,
    pub timestamp: String,
}

impl ExecutionEvent {
    pub fn plan(kind: EventKind, progress: ProgressSnapshot) -> Self {
        Self {
            kind,
            plan_id: progress.plan_id.clone(),
            task_id: None,
            task_name: None,
            attempt: None,
            delay_ms: None,
            error: None,
            progress,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn task(kind: EventKind, task: &PlannedTask, progress: ProgressSnapshot) -> Self {
        let mut event = Self::plan(kind, progress);
        event.task_id = Some(task.id.clone());
        event.task_name = Some(task.name.clone());
        event
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }

    pub fn with_retry(mut self, attempt: u32, delay_ms: u64) -> Self {
        self.attempt = Some(attempt);
        self.delay_ms = Some(delay_ms);
        self
    }
}

/// Event handler. Returning an error only logs it.
pub type EventHandler = Box<dyn Fn(&ExecutionEvent) -> anyhow::Result<()> + Send + Sync>;

/// Progress listener, called after every task state change.
pub type ProgressListener = Box<dyn Fn(&ProgressSnapshot) -> anyhow::Result<()> + Send + Sync>;

/// Synchronous dispatcher of events and progress snapshots.
#[derive(Default)]
pub struct EventBus {
    /// `None` subscribes to every kind
    handlers: Vec<(Option<EventKind>, EventHandler)>,
    progress: Vec<ProgressListener>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handlers.len())
            .field("progress_listeners", &self.progress.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one kind of event.
    pub fn on<F>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(&ExecutionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.push((Some(kind), Box::new(handler)));
    }

    /// Subscribe to every event.
    pub fn on_any<F>(&mut self, handler: F)
    where
        F: Fn(&ExecutionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.push((None, Box::new(handler)));
    }

    pub fn on_progress<F>(&mut self, listener: F)
    where
        F: Fn(&ProgressSnapshot) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.progress.push(Box::new(listener));
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers
            .iter()
            .filter(|(k, _)| k.map_or(true, |k| k == kind))
            .count()
    }

    pub fn emit(&self, event: &ExecutionEvent) {
        for (filter, handler) in &self.handlers {
            if filter.map_or(false, |k| k != event.kind) {
                continue;
            }
            if let Err(e) = handler(event) {
                tracing::warn!(
                    "[EventBus] Handler for {} on plan {} failed: {:#}",
                    event.kind,
                    event.plan_id,
                    e
                );
            }
        }
    }

    pub fn emit_progress(&self, progress: &ProgressSnapshot) {
        for listener in &self.progress {
            if let Err(e) = listener(progress) {
                tracing::warn!(
                    "[EventBus] Progress listener on plan {} failed: {:#}",
                    progress.plan_id,
                    e
                );
            }
        }
    }
}
