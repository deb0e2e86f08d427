//! Progress Snapshots
//!
//! A progress snapshot is a pure function of the plan's task states, so
//! computing it twice over unchanged state yields identical snapshots.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::plan::Plan;
use crate::models::task::{PlannedTask, TaskStatus};

/// Coarse plan state derived from task counts alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// Nothing dispatched yet
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressStatus::Idle => write!(f, "idle"),
            ProgressStatus::Running => write!(f, "running"),
            ProgressStatus::Completed => write!(f, "completed"),
            ProgressStatus::Failed => write!(f, "failed"),
            ProgressStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Point-in-time view of a plan's execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub plan_id: String,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub running: usize,
    pub pending: usize,
    pub skipped: usize,
    pub cancelled: usize,
    /// `round(100 * (completed + failed) / total)`
    pub percentage: u32,
    /// Name of the first running task, in plan order
    pub current_task: Option<String>,
    pub status: ProgressStatus,
}

fn percentage(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * done as f64 / total as f64).round() as u32
}

fn derive_status(total: usize, completed: usize, running: usize, pending: usize, cancelled: usize) -> ProgressStatus {
    if total == 0 || pending == total {
        ProgressStatus::Idle
    } else if running > 0 || pending > 0 {
        ProgressStatus::Running
    } else if completed > 0 {
        ProgressStatus::Completed
    } else if cancelled > 0 {
        ProgressStatus::Cancelled
    } else {
        ProgressStatus::Failed
    }
}

/// Build a progress snapshot from a plan.
pub fn build_progress(plan: &Plan) -> ProgressSnapshot {
    snapshot_of(&plan.id, plan.tasks.iter().collect())
}

/// Progress of `plan` with `task` standing in for the plan's copy of it,
/// for tasks whose latest state has not been written back yet.
pub fn build_progress_with(plan: &Plan, task: &PlannedTask) -> ProgressSnapshot {
    let tasks = plan
        .tasks
        .iter()
        .map(|t| if t.id == task.id { task } else { t })
        .collect();
    snapshot_of(&plan.id, tasks)
}

fn snapshot_of(plan_id: &str, tasks: Vec<&PlannedTask>) -> ProgressSnapshot {
    let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();

    let total = tasks.len();
    let completed = count(TaskStatus::Completed);
    let failed = count(TaskStatus::Failed);
    let running = count(TaskStatus::Running);
    let pending = count(TaskStatus::Pending);
    let skipped = count(TaskStatus::Skipped);
    let cancelled = count(TaskStatus::Cancelled);

    ProgressSnapshot {
        plan_id: plan_id.to_string(),
        total,
        completed,
        failed,
        running,
        pending,
        skipped,
        cancelled,
        percentage: percentage(completed + failed, total),
        current_task: tasks
            .iter()
            .find(|t| t.status == TaskStatus::Running)
            .map(|t| t.name.clone()),
        status: derive_status(total, completed, running, pending, cancelled),
    }
}
