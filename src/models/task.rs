//! Planned Task Models
//!
//! Data structures for a single concrete unit of work inside a plan,
//! its dependencies and its normalized result.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use task_cascade_core::{GroundedAction, Params};

// ============================================================================
// Task Type & Category
// ============================================================================

/// Whether a task is delegated to the text capability or drives the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Text,
    PageAction,
}

/// Type of work a task performs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskType {
    // Text operations
    Summarize,
    Translate,
    Rewrite,
    Explain,
    ExtractInfo,
    Analyze,
    Compose,
    Answer,
    FormatList,
    // Page automation
    Click,
    Type,
    Scroll,
    Navigate,
    Wait,
    Extract,
    Screenshot,
    Hover,
    Select,
    Search,
    Login,
    /// Caller-defined task type
    Custom(String),
}

impl TaskType {
    pub fn id(&self) -> &str {
        match self {
            TaskType::Summarize => "summarize",
            TaskType::Translate => "translate",
            TaskType::Rewrite => "rewrite",
            TaskType::Explain => "explain",
            TaskType::ExtractInfo => "extract_info",
            TaskType::Analyze => "analyze",
            TaskType::Compose => "compose",
            TaskType::Answer => "answer",
            TaskType::FormatList => "format_list",
            TaskType::Click => "click",
            TaskType::Type => "type",
            TaskType::Scroll => "scroll",
            TaskType::Navigate => "navigate",
            TaskType::Wait => "wait",
            TaskType::Extract => "extract",
            TaskType::Screenshot => "screenshot",
            TaskType::Hover => "hover",
            TaskType::Select => "select",
            TaskType::Search => "search",
            TaskType::Login => "login",
            TaskType::Custom(id) => id,
        }
    }

    /// Built-in category. Custom types default to text; the task catalogue
    /// may say otherwise.
    pub fn category(&self) -> TaskCategory {
        match self {
            TaskType::Click
            | TaskType::Type
            | TaskType::Scroll
            | TaskType::Navigate
            | TaskType::Wait
            | TaskType::Extract
            | TaskType::Screenshot
            | TaskType::Hover
            | TaskType::Select
            | TaskType::Search
            | TaskType::Login => TaskCategory::PageAction,
            _ => TaskCategory::Text,
        }
    }

    pub fn is_page_action(&self) -> bool {
        self.category() == TaskCategory::PageAction
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for TaskType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "summarize" => TaskType::Summarize,
            "translate" => TaskType::Translate,
            "rewrite" => TaskType::Rewrite,
            "explain" => TaskType::Explain,
            "extract_info" => TaskType::ExtractInfo,
            "analyze" => TaskType::Analyze,
            "compose" => TaskType::Compose,
            "answer" => TaskType::Answer,
            "format_list" => TaskType::FormatList,
            "click" => TaskType::Click,
            "type" => TaskType::Type,
            "scroll" => TaskType::Scroll,
            "navigate" => TaskType::Navigate,
            "wait" => TaskType::Wait,
            "extract" => TaskType::Extract,
            "screenshot" => TaskType::Screenshot,
            "hover" => TaskType::Hover,
            "select" => TaskType::Select,
            "search" => TaskType::Search,
            "login" => TaskType::Login,
            other => TaskType::Custom(other.to_string()),
        })
    }
}

impl From<String> for TaskType {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(t) => t,
            Err(never) => match never {},
        }
    }
}

impl From<TaskType> for String {
    fn from(t: TaskType) -> String {
        t.id().to_string()
    }
}

// ============================================================================
// Priority & Status
// ============================================================================

/// Task priority. Ordering: `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Critical => write!(f, "critical"),
        }
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped | TaskStatus::Cancelled
        )
    }

    /// Transitions are monotonic, except the explicit retry edge
    /// `failed -> pending`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Skipped)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Failed, Pending)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Skipped => write!(f, "skipped"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ============================================================================
// Dependencies
// ============================================================================

/// When a dependency counts as satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DependencyCondition {
    /// Upstream completed successfully
    #[default]
    OnSuccess,
    /// Upstream failed terminally
    OnFailure,
    /// Upstream finished either way
    OnCompletion,
}

impl DependencyCondition {
    pub fn is_satisfied_by(&self, upstream: TaskStatus) -> bool {
        match self {
            DependencyCondition::OnSuccess => upstream == TaskStatus::Completed,
            DependencyCondition::OnFailure => upstream == TaskStatus::Failed,
            DependencyCondition::OnCompletion => {
                matches!(upstream, TaskStatus::Completed | TaskStatus::Failed)
            }
        }
    }
}

/// Edge from a task to one of its upstream tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDependency {
    /// Upstream task id
    pub task_id: String,
    #[serde(default)]
    pub condition: DependencyCondition,
    /// Target parameter name -> dot path into the upstream payload
    #[serde(default)]
    pub output_mapping: BTreeMap<String, String>,
}

impl TaskDependency {
    pub fn on_success(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            condition: DependencyCondition::OnSuccess,
            output_mapping: BTreeMap::new(),
        }
    }

    pub fn with_condition(mut self, condition: DependencyCondition) -> Self {
        self.condition = condition;
        self
    }

    pub fn map(mut self, param: impl Into<String>, path: impl Into<String>) -> Self {
        self.output_mapping.insert(param.into(), path.into());
        self
    }
}

// ============================================================================
// Result
// ============================================================================

/// Classification of a task failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// Missing or malformed parameter; never retried
    Validation,
    /// A collaborator call failed; retried within budget
    Capability,
    /// A page action could not be executed against its target
    Grounding,
    Internal,
}

impl TaskErrorKind {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TaskErrorKind::Validation)
    }
}

/// Normalized outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<TaskErrorKind>,
    pub duration_ms: u64,
}

impl TaskResult {
    pub fn ok(data: Value, duration_ms: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            duration_ms,
        }
    }

    pub fn failed(kind: TaskErrorKind, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            error_kind: Some(kind),
            duration_ms,
        }
    }

    /// Attach partial data to a failed result (e.g. per-action records).
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_retryable(&self) -> bool {
        !self.success && self.error_kind.map_or(true, |k| k.is_retryable())
    }
}

// ============================================================================
// PlannedTask
// ============================================================================

/// One concrete, parameterized unit of work within a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedTask {
    pub id: String,
    pub name: String,
    pub task_type: TaskType,
    #[serde(default)]
    pub parameters: Params,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub dependencies: Vec<TaskDependency>,
    #[serde(default)]
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub result: Option<TaskResult>,
    /// Actions bound at planning time; the runner synthesizes them otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<GroundedAction>>,
    #[serde(default)]
    pub execution_order: usize,
    #[serde(default = "default_parallelizable")]
    pub parallelizable: bool,
    #[serde(default)]
    pub estimated_duration_ms: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

fn default_parallelizable() -> bool {
    true
}

impl PlannedTask {
    /// Create a pending task with the default retry budget for its category.
    pub fn new(id: impl Into<String>, name: impl Into<String>, task_type: TaskType) -> Self {
        let max_retries = match task_type.category() {
            TaskCategory::Text => 3,
            TaskCategory::PageAction => 2,
        };
        Self {
            id: id.into(),
            name: name.into(),
            task_type,
            parameters: Params::new(),
            priority: TaskPriority::default(),
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            retry_count: 0,
            max_retries,
            created_at: chrono::Utc::now().to_rfc3339(),
            started_at: None,
            completed_at: None,
            result: None,
            actions: None,
            execution_order: 0,
            parallelizable: true,
            estimated_duration_ms: 0,
            tags: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<task_cascade_core::ParamValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependency(mut self, dependency: TaskDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_parallelizable(mut self, parallelizable: bool) -> Self {
        self.parallelizable = parallelizable;
        self
    }

    pub fn depends_on(&self, task_id: &str) -> bool {
        self.dependencies.iter().any(|d| d.task_id == task_id)
    }

    /// Move to `next` if the status machine allows it.
    fn transition(&mut self, next: TaskStatus) -> bool {
        if !self.status.can_transition_to(next) {
            tracing::warn!(
                "[PlannedTask] Rejected transition of {} from {} to {}",
                self.id,
                self.status,
                next
            );
            return false;
        }
        self.status = next;
        true
    }

    /// `pending -> running`. Returns false if the task was not pending.
    pub fn mark_running(&mut self) -> bool {
        if !self.transition(TaskStatus::Running) {
            return false;
        }
        self.started_at = Some(chrono::Utc::now().to_rfc3339());
        true
    }

    /// Record a terminal outcome of one attempt. Ignored unless running.
    pub fn finish(&mut self, result: TaskResult) -> bool {
        let next = if result.success {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        if !self.transition(next) {
            return false;
        }
        self.completed_at = Some(chrono::Utc::now().to_rfc3339());
        self.result = Some(result);
        true
    }

    /// Retry transition: `failed -> pending`, bumping the counter.
    /// Returns false when the budget is exhausted.
    pub fn reset_for_retry(&mut self) -> bool {
        if self.status != TaskStatus::Failed || self.retry_count >= self.max_retries {
            return false;
        }
        if !self.transition(TaskStatus::Pending) {
            return false;
        }
        self.retry_count += 1;
        self.completed_at = None;
        true
    }
}
