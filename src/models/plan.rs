//! Plan Models
//!
//! A plan is the task graph plus the metadata needed to schedule it.
//! Plans are in-memory, caller-owned and identified by generated ids.

use std::fmt;

use serde::{Deserialize, Serialize};
use task_cascade_core::PageSnapshot;

use super::task::{PlannedTask, TaskStatus};

/// Lifecycle status of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    #[default]
    Draft,
    Ready,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl PlanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlanStatus::Completed | PlanStatus::Failed | PlanStatus::Cancelled
        )
    }

    /// Whether an engine may start executing a plan in this state.
    pub fn is_executable(&self) -> bool {
        matches!(self, PlanStatus::Draft | PlanStatus::Ready)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStatus::Draft => write!(f, "draft"),
            PlanStatus::Ready => write!(f, "ready"),
            PlanStatus::Executing => write!(f, "executing"),
            PlanStatus::Completed => write!(f, "completed"),
            PlanStatus::Failed => write!(f, "failed"),
            PlanStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Scheduling policy used to drive a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingPolicy {
    Sequential,
    Parallel,
    PriorityBased,
    #[default]
    DependencyAware,
}

impl fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulingPolicy::Sequential => write!(f, "sequential"),
            SchedulingPolicy::Parallel => write!(f, "parallel"),
            SchedulingPolicy::PriorityBased => write!(f, "priority_based"),
            SchedulingPolicy::DependencyAware => write!(f, "dependency_aware"),
        }
    }
}

/// Per-plan scheduling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanConfig {
    /// Maximum tasks in flight within one batch
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Cap on every task's retry budget
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Upper bound on the number of tasks; larger plans are not executed
    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_tasks() -> usize {
    20
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_retries: default_max_retries(),
            max_tasks: default_max_tasks(),
        }
    }
}

/// The unit of execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    /// Free-text instruction the plan was derived from
    pub instruction: String,
    /// Short goal statement derived from the instruction
    pub goal: String,
    pub tasks: Vec<PlannedTask>,
    #[serde(default)]
    pub status: PlanStatus,
    /// Page snapshot captured when the plan was made
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PageSnapshot>,
    #[serde(default)]
    pub config: PlanConfig,
    /// Sum of per-task estimates
    #[serde(default)]
    pub estimated_duration_ms: u64,
    /// Estimate assuming parallelizable tasks overlap
    #[serde(default)]
    pub estimated_parallel_duration_ms: u64,
    /// Ids of completed tasks in completion order
    #[serde(default)]
    pub completed_task_ids: Vec<String>,
    /// Ids of terminally failed tasks in failure order
    #[serde(default)]
    pub failed_task_ids: Vec<String>,
    pub created_at: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

impl Plan {
    /// Create a draft plan with a fresh id.
    pub fn new(instruction: impl Into<String>, goal: impl Into<String>, tasks: Vec<PlannedTask>) -> Self {
        Self {
            id: format!("plan-{}", uuid::Uuid::new_v4()),
            instruction: instruction.into(),
            goal: goal.into(),
            tasks,
            status: PlanStatus::Draft,
            snapshot: None,
            config: PlanConfig::default(),
            estimated_duration_ms: 0,
            estimated_parallel_duration_ms: 0,
            completed_task_ids: Vec::new(),
            failed_task_ids: Vec::new(),
            created_at: chrono::Utc::now().to_rfc3339(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_config(mut self, config: PlanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_snapshot(mut self, snapshot: Option<PageSnapshot>) -> Self {
        self.snapshot = snapshot;
        self
    }

    pub fn task(&self, id: &str) -> Option<&PlannedTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut PlannedTask> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.task(id).map(|t| t.status)
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .map(|t| t.id.clone())
            .collect()
    }

    /// Whether a still-pending task holds a success-conditioned dependency
    /// on `task_id`.
    pub fn has_pending_success_dependent(&self, task_id: &str) -> bool {
        self.tasks.iter().any(|t| {
            t.status == TaskStatus::Pending
                && t.dependencies.iter().any(|d| {
                    d.task_id == task_id
                        && d.condition == super::task::DependencyCondition::OnSuccess
                })
        })
    }

    /// Recompute duration estimates from the tasks.
    ///
    /// The parallel estimate assumes parallelizable tasks overlap perfectly
    /// up to `max_concurrency` while the rest run back to back.
    pub fn recompute_estimates(&mut self) {
        self.estimated_duration_ms = self.tasks.iter().map(|t| t.estimated_duration_ms).sum();

        let serial: u64 = self
            .tasks
            .iter()
            .filter(|t| !t.parallelizable)
            .map(|t| t.estimated_duration_ms)
            .sum();
        let mut parallel: Vec<u64> = self
            .tasks
            .iter()
            .filter(|t| t.parallelizable)
            .map(|t| t.estimated_duration_ms)
            .collect();
        parallel.sort_unstable_by(|a, b| b.cmp(a));
        let width = self.config.max_concurrency.max(1);
        let overlapped: u64 = parallel.chunks(width).map(|c| c[0]).sum();
        self.estimated_parallel_duration_ms = serial + overlapped;
    }

    /// Transition `draft -> ready`.
    pub fn mark_ready(&mut self) {
        if self.status == PlanStatus::Draft {
            self.status = PlanStatus::Ready;
        }
    }
}
