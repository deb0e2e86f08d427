//! Execution Context
//!
//! Per-run state shared (read-only) with every dispatched task: the plan's
//! identity, its page snapshot and the producer-keyed result store.

use std::time::Instant;

use serde_json::Value;
use task_cascade_core::{PageSnapshot, ParamValue, Params, ResultStore};

use crate::models::plan::{Plan, SchedulingPolicy};
use crate::models::task::PlannedTask;

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub plan_id: String,
    pub instruction: String,
    pub policy: SchedulingPolicy,
    pub snapshot: Option<PageSnapshot>,
    pub store: ResultStore,
    pub completed: usize,
    pub failed: usize,
    started: Instant,
}

impl ExecutionContext {
    pub fn new(plan: &Plan, policy: SchedulingPolicy) -> Self {
        Self {
            plan_id: plan.id.clone(),
            instruction: plan.instruction.clone(),
            policy,
            snapshot: plan.snapshot.clone(),
            store: ResultStore::new(),
            completed: 0,
            failed: 0,
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Publish a completed task's payload for its dependents.
    pub fn record_success(&mut self, task_id: &str, payload: Option<&Value>) {
        self.completed += 1;
        if let Some(payload) = payload {
            self.store.publish(task_id, payload.clone());
        }
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// The task's own parameters overlaid with values pulled through its
    /// dependencies' output mappings. A mapping whose producer or path is
    /// missing contributes nothing.
    pub fn effective_params(&self, task: &PlannedTask) -> Params {
        let mut params = task.parameters.clone();
        for dep in &task.dependencies {
            for (param, path) in &dep.output_mapping {
                match self.store.lookup(&dep.task_id, path).and_then(ParamValue::from_json) {
                    Some(value) => {
                        params.insert(param.clone(), value);
                    }
                    None => {
                        tracing::debug!(
                            "[ExecutionContext] {} -> {}.{}: nothing at path '{}'",
                            dep.task_id,
                            task.id,
                            param,
                            path
                        );
                    }
                }
            }
        }
        params
    }
}
