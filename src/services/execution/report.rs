//! Execution Report
//!
//! Summary handed back to the caller once a plan stops executing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::plan::{Plan, PlanStatus, SchedulingPolicy};
use crate::models::task::{TaskResult, TaskStatus};

/// Final state of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcome {
    pub task_id: String,
    pub name: String,
    pub status: TaskStatus,
    /// Number of dispatches, retries included; zero if never dispatched
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub plan_id: String,
    pub status: PlanStatus,
    pub policy: SchedulingPolicy,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
    pub pending: usize,
    pub duration_ms: u64,
    pub outcomes: Vec<TaskOutcome>,
    /// Shared store contents, keyed by producer task id
    pub outputs: BTreeMap<String, Value>,
    /// Task whose failure stopped the plan, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halted_by: Option<String>,
    /// Set when no pending task could ever become ready
    pub deadlocked: bool,
    #[serde(default)]
    pub deadlocked_task_ids: Vec<String>,
}

impl ExecutionReport {
    pub(crate) fn from_plan(
        plan: &Plan,
        policy: SchedulingPolicy,
        duration_ms: u64,
        outputs: BTreeMap<String, Value>,
    ) -> Self {
        let outcomes = plan
            .tasks
            .iter()
            .map(|task| TaskOutcome {
                task_id: task.id.clone(),
                name: task.name.clone(),
                status: task.status,
                attempts: if task.started_at.is_some() {
                    task.retry_count + 1
                } else {
                    0
                },
                result: task.result.clone(),
            })
            .collect();

        Self {
            plan_id: plan.id.clone(),
            status: plan.status,
            policy,
            total: plan.tasks.len(),
            completed: plan.count(TaskStatus::Completed),
            failed: plan.count(TaskStatus::Failed),
            skipped: plan.count(TaskStatus::Skipped),
            cancelled: plan.count(TaskStatus::Cancelled),
            pending: plan.count(TaskStatus::Pending),
            duration_ms,
            outcomes,
            outputs,
            halted_by: None,
            deadlocked: false,
            deadlocked_task_ids: Vec::new(),
        }
    }

    pub fn outcome(&self, task_id: &str) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.task_id == task_id)
    }

    pub fn output(&self, task_id: &str) -> Option<&Value> {
        self.outputs.get(task_id)
    }

    pub fn is_success(&self) -> bool {
        self.status == PlanStatus::Completed
    }
}
