//! Execution Engine
//!
//! Drives a plan to a terminal state under one of four scheduling policies:
//!
//! - `sequential`: one task at a time in execution order
//! - `parallel`: parallelizable tasks in batches, then the rest one by one
//! - `priority_based`: one task at a time, highest priority first
//! - `dependency_aware`: repeatedly dispatch every ready task
//!
//! Batches run their members concurrently and settle as a whole: results,
//! shared-store entries and plan state are applied only after every member
//! has finished. Members see the plan and the shared store read-only.
//!
//! Under `sequential` and `priority_based` a terminal failure halts the plan
//! when the failed task is critical or a pending task needs it to succeed.
//! Tasks left behind by a halt or a deadlock stay pending.

use std::sync::Mutex;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;

use super::context::ExecutionContext;
use super::events::{EventBus, EventKind, ExecutionEvent};
use super::progress::{build_progress, build_progress_with, ProgressSnapshot};
use super::report::ExecutionReport;
use super::runner::TaskRunner;
use crate::models::plan::{Plan, PlanStatus, SchedulingPolicy};
use crate::models::settings::EngineSettings;
use crate::models::task::{PlannedTask, TaskPriority, TaskStatus};
use crate::utils::error::{AppError, AppResult};

/// Bookkeeping of a single `execute` call.
struct RunState {
    cancel: CancellationToken,
    halted_by: Option<String>,
    deadlocked: Vec<String>,
}

impl RunState {
    fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Task ids in execution order; ties keep plan order.
fn ordered_ids(plan: &Plan) -> Vec<String> {
    let mut tasks: Vec<&PlannedTask> = plan.tasks.iter().collect();
    tasks.sort_by_key(|t| t.execution_order);
    tasks.into_iter().map(|t| t.id.clone()).collect()
}

/// Task ids by descending priority; ties keep execution order.
fn priority_ids(plan: &Plan) -> Vec<String> {
    let mut tasks: Vec<&PlannedTask> = plan.tasks.iter().collect();
    tasks.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.execution_order.cmp(&b.execution_order)));
    tasks.into_iter().map(|t| t.id.clone()).collect()
}

/// Pending tasks whose every dependency is satisfied, in execution order.
fn ready_ids(plan: &Plan) -> Vec<String> {
    ordered_ids(plan)
        .into_iter()
        .filter(|id| {
            plan.task(id).map_or(false, |task| {
                task.status == TaskStatus::Pending
                    && task.dependencies.iter().all(|dep| {
                        plan.status_of(&dep.task_id)
                            .map_or(false, |status| dep.condition.is_satisfied_by(status))
                    })
            })
        })
        .collect()
}

/// An upstream that already finished in a way the dependency can never accept.
fn unsatisfiable_dependency(plan: &Plan, task: &PlannedTask) -> Option<String> {
    task.dependencies
        .iter()
        .find(|dep| {
            plan.status_of(&dep.task_id).map_or(false, |status| {
                status.is_terminal() && !dep.condition.is_satisfied_by(status)
            })
        })
        .map(|dep| dep.task_id.clone())
}

fn should_halt(plan: &Plan, failed_id: &str) -> bool {
    plan.task(failed_id)
        .map_or(false, |t| t.priority == TaskPriority::Critical)
        || plan.has_pending_success_dependent(failed_id)
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Schedules plans, owns retry policy and emits lifecycle events.
pub struct ExecutionEngine {
    runner: TaskRunner,
    events: EventBus,
    settings: EngineSettings,
    /// Root of the tokens handed to `execute`; replaced once cancelled
    cancel: Mutex<CancellationToken>,
}

impl ExecutionEngine {
    pub fn new(runner: TaskRunner, settings: EngineSettings) -> Self {
        let runner = if settings.resnapshot_before_actions {
            runner.resnapshot_before_actions(true)
        } else {
            runner
        };
        Self {
            runner,
            events: EventBus::new(),
            settings,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Subscribe to one kind of lifecycle event.
    pub fn on<F>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(&ExecutionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.events.on(kind, handler);
    }

    pub fn on_progress<F>(&mut self, listener: F)
    where
        F: Fn(&ProgressSnapshot) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.events.on_progress(listener);
    }

    /// Token that cancels the executions started through `execute`, both
    /// running ones and the next one to start. Once an execution ends under
    /// a cancelled token the engine switches to a fresh one, so later
    /// executions are unaffected.
    pub fn cancellation_token(&self) -> CancellationToken {
        match self.cancel.lock() {
            Ok(root) => root.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn cancel(&self) {
        tracing::info!("[ExecutionEngine] Cancellation requested");
        self.cancellation_token().cancel();
    }

    fn rearm(&self) {
        let mut root = match self.cancel.lock() {
            Ok(root) => root,
            Err(poisoned) => poisoned.into_inner(),
        };
        if root.is_cancelled() {
            tracing::debug!("[ExecutionEngine] Replacing cancelled root token");
            *root = CancellationToken::new();
        }
    }

    /// Execute with the configured default policy and the plan's own
    /// concurrency limit.
    pub async fn run(&self, plan: &mut Plan) -> AppResult<ExecutionReport> {
        let limit = plan.config.max_concurrency;
        self.execute(plan, self.settings.default_policy, limit).await
    }

    pub async fn execute(
        &self,
        plan: &mut Plan,
        policy: SchedulingPolicy,
        concurrency_limit: usize,
    ) -> AppResult<ExecutionReport> {
        let root = self.cancellation_token();
        let result = self
            .execute_with_token(plan, policy, concurrency_limit, root.child_token())
            .await;
        if root.is_cancelled() {
            self.rearm();
        }
        result
    }

    /// Execute under a caller-owned cancellation token.
    ///
    /// Cancellation is observed before each dispatch; tasks already in
    /// flight run to the end of their attempt loop, the remaining pending
    /// tasks become cancelled.
    pub async fn execute_with_token(
        &self,
        plan: &mut Plan,
        policy: SchedulingPolicy,
        concurrency_limit: usize,
        cancel: CancellationToken,
    ) -> AppResult<ExecutionReport> {
        if !plan.status.is_executable() {
            return Err(AppError::execution(format!(
                "plan {} is {} and cannot be executed",
                plan.id, plan.status
            )));
        }
        if concurrency_limit == 0 {
            return Err(AppError::validation("concurrency limit must be at least 1"));
        }
        if plan.tasks.len() > plan.config.max_tasks {
            return Err(AppError::validation(format!(
                "plan {} has {} tasks, more than its limit of {}",
                plan.id,
                plan.tasks.len(),
                plan.config.max_tasks
            )));
        }

        tracing::info!(
            "[ExecutionEngine] Executing plan {} ({} tasks, policy {}, concurrency {})",
            plan.id,
            plan.tasks.len(),
            policy,
            concurrency_limit
        );

        plan.status = PlanStatus::Executing;
        plan.started_at = Some(now());
        let mut ctx = ExecutionContext::new(plan, policy);
        let mut run = RunState {
            cancel,
            halted_by: None,
            deadlocked: Vec::new(),
        };
        self.emit_plan(EventKind::PlanStarted, plan);

        match policy {
            SchedulingPolicy::Sequential => {
                let order = ordered_ids(plan);
                self.run_one_by_one(plan, &mut ctx, &mut run, order).await;
            }
            SchedulingPolicy::PriorityBased => {
                let order = priority_ids(plan);
                self.run_one_by_one(plan, &mut ctx, &mut run, order).await;
            }
            SchedulingPolicy::Parallel => {
                self.run_parallel(plan, &mut ctx, &mut run, concurrency_limit).await;
            }
            SchedulingPolicy::DependencyAware => {
                self.run_dependency_aware(plan, &mut ctx, &mut run, concurrency_limit)
                    .await;
            }
        }

        let cancelled = run.cancelled() && plan.count(TaskStatus::Pending) > 0;
        if cancelled {
            for task in plan.tasks.iter_mut().filter(|t| t.status == TaskStatus::Pending) {
                task.status = TaskStatus::Cancelled;
                task.completed_at = Some(now());
            }
            self.events.emit_progress(&build_progress(plan));
        }

        plan.status = if cancelled {
            PlanStatus::Cancelled
        } else if plan.tasks.is_empty() || plan.count(TaskStatus::Completed) > 0 {
            PlanStatus::Completed
        } else {
            PlanStatus::Failed
        };
        plan.completed_at = Some(now());

        let kind = match plan.status {
            PlanStatus::Cancelled => EventKind::PlanCancelled,
            PlanStatus::Completed => EventKind::PlanCompleted,
            _ => EventKind::PlanFailed,
        };
        self.emit_plan(kind, plan);

        let mut report = ExecutionReport::from_plan(plan, policy, ctx.elapsed_ms(), ctx.store.to_map());
        report.halted_by = run.halted_by;
        report.deadlocked = !run.deadlocked.is_empty();
        report.deadlocked_task_ids = run.deadlocked;

        tracing::info!(
            "[ExecutionEngine] Plan {} finished as {}: {} completed, {} failed, {} pending ({} ms)",
            plan.id,
            plan.status,
            report.completed,
            report.failed,
            report.pending,
            report.duration_ms
        );
        Ok(report)
    }

    // ========================================================================
    // Policies
    // ========================================================================

    async fn run_one_by_one(
        &self,
        plan: &mut Plan,
        ctx: &mut ExecutionContext,
        run: &mut RunState,
        order: Vec<String>,
    ) {
        for id in order {
            if run.cancelled() {
                tracing::info!("[ExecutionEngine] Plan {} cancelled before {}", plan.id, id);
                return;
            }
            let Some(task) = plan.task(&id) else {
                continue;
            };
            if task.status != TaskStatus::Pending {
                continue;
            }
            if let Some(upstream) = unsatisfiable_dependency(plan, task) {
                tracing::info!(
                    "[ExecutionEngine] Skipping {}: dependency on {} can no longer be met",
                    id,
                    upstream
                );
                if let Some(task) = plan.task_mut(&id) {
                    task.status = TaskStatus::Skipped;
                    task.completed_at = Some(now());
                }
                self.events.emit_progress(&build_progress(plan));
                continue;
            }

            self.run_batch(plan, ctx, std::slice::from_ref(&id)).await;

            if plan.status_of(&id) == Some(TaskStatus::Failed) && should_halt(plan, &id) {
                tracing::warn!("[ExecutionEngine] Plan {} halted by failure of {}", plan.id, id);
                run.halted_by = Some(id);
                return;
            }
        }
    }

    async fn run_parallel(&self, plan: &mut Plan, ctx: &mut ExecutionContext, run: &mut RunState, limit: usize) {
        let (parallel, serial): (Vec<String>, Vec<String>) = ordered_ids(plan)
            .into_iter()
            .filter(|id| plan.status_of(id) == Some(TaskStatus::Pending))
            .partition(|id| plan.task(id).map_or(false, |t| t.parallelizable));

        for batch in parallel.chunks(limit) {
            if run.cancelled() {
                return;
            }
            self.run_batch(plan, ctx, batch).await;
        }
        for id in serial {
            if run.cancelled() {
                return;
            }
            self.run_batch(plan, ctx, std::slice::from_ref(&id)).await;
        }
    }

    async fn run_dependency_aware(
        &self,
        plan: &mut Plan,
        ctx: &mut ExecutionContext,
        run: &mut RunState,
        limit: usize,
    ) {
        let mut iteration = 0usize;
        loop {
            if run.cancelled() {
                return;
            }

            let ready = ready_ids(plan);
            if ready.is_empty() {
                let stuck = plan.pending_ids();
                if !stuck.is_empty() {
                    tracing::warn!(
                        "[ExecutionEngine] Plan {} deadlocked: {:?} can never become ready",
                        plan.id,
                        stuck
                    );
                    run.deadlocked = stuck;
                }
                return;
            }

            iteration += 1;
            let (parallel, serial): (Vec<String>, Vec<String>) = ready
                .into_iter()
                .partition(|id| plan.task(id).map_or(false, |t| t.parallelizable));
            tracing::debug!(
                "[ExecutionEngine] Iteration {}: {} serial, {} parallel",
                iteration,
                serial.len(),
                parallel.len()
            );

            for id in serial {
                if run.cancelled() {
                    return;
                }
                self.run_batch(plan, ctx, std::slice::from_ref(&id)).await;
            }
            for batch in parallel.chunks(limit) {
                if run.cancelled() {
                    return;
                }
                self.run_batch(plan, ctx, batch).await;
            }
        }
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Dispatch `ids` concurrently and apply their outcomes once all settle.
    async fn run_batch(&self, plan: &mut Plan, ctx: &mut ExecutionContext, ids: &[String]) {
        for id in ids {
            if let Some(task) = plan.task_mut(id) {
                task.mark_running();
            }
        }
        let progress = build_progress(plan);
        for id in ids {
            if let Some(task) = plan.task(id) {
                self.events
                    .emit(&ExecutionEvent::task(EventKind::TaskStarted, task, progress.clone()));
            }
        }
        self.events.emit_progress(&progress);

        let budget = plan.config.max_retries;
        let dispatched: Vec<PlannedTask> = ids
            .iter()
            .filter_map(|id| plan.task(id).cloned())
            .map(|mut task| {
                task.max_retries = task.max_retries.min(budget);
                task
            })
            .collect();
        let finished = {
            let plan_view: &Plan = plan;
            let ctx_view: &ExecutionContext = ctx;
            join_all(
                dispatched
                    .into_iter()
                    .map(|task| self.attempt(task, plan_view, ctx_view)),
            )
            .await
        };

        for task in finished {
            self.settle(plan, ctx, task);
        }
    }

    /// Run one task through its bounded retry loop.
    async fn attempt(&self, mut task: PlannedTask, plan: &Plan, ctx: &ExecutionContext) -> PlannedTask {
        loop {
            let result = self.runner.run(&task, ctx).await;
            let retryable = result.is_retryable();
            let error = result.error.clone();
            task.finish(result);

            if task.status == TaskStatus::Completed || !retryable || !task.reset_for_retry() {
                return task;
            }

            let delay = self.settings.retry_base_delay() * task.retry_count;
            tracing::info!(
                "[ExecutionEngine] Retrying {} ({}/{}) in {:?}: {}",
                task.id,
                task.retry_count,
                task.max_retries,
                delay,
                error.as_deref().unwrap_or("unknown error")
            );
            self.events.emit(
                &ExecutionEvent::task(EventKind::TaskRetry, &task, build_progress_with(plan, &task))
                    .with_error(error)
                    .with_retry(task.retry_count, delay.as_millis() as u64),
            );

            tokio::time::sleep(delay).await;
            task.mark_running();
        }
    }

    /// Write a finished task back into the plan and publish its output.
    fn settle(&self, plan: &mut Plan, ctx: &mut ExecutionContext, finished: PlannedTask) {
        let id = finished.id.clone();
        let status = finished.status;
        let payload = finished.result.as_ref().and_then(|r| r.data.clone());
        let error = finished.result.as_ref().and_then(|r| r.error.clone());

        let Some(slot) = plan.task_mut(&id) else {
            return;
        };
        *slot = finished;

        let kind = if status == TaskStatus::Completed {
            ctx.record_success(&id, payload.as_ref());
            plan.completed_task_ids.push(id.clone());
            tracing::info!("[ExecutionEngine] Task {} completed", id);
            EventKind::TaskCompleted
        } else {
            ctx.record_failure();
            plan.failed_task_ids.push(id.clone());
            tracing::warn!(
                "[ExecutionEngine] Task {} failed: {}",
                id,
                error.as_deref().unwrap_or("unknown error")
            );
            EventKind::TaskFailed
        };

        let progress = build_progress(plan);
        if let Some(task) = plan.task(&id) {
            let event = ExecutionEvent::task(kind, task, progress.clone());
            let event = if kind == EventKind::TaskFailed {
                event.with_error(error)
            } else {
                event
            };
            self.events.emit(&event);
        }
        self.events.emit_progress(&progress);
    }

    fn emit_plan(&self, kind: EventKind, plan: &Plan) {
        let progress = build_progress(plan);
        self.events.emit(&ExecutionEvent::plan(kind, progress.clone()));
        self.events.emit_progress(&progress);
    }
}
