//! Task Graph
//!
//! Topological ordering of planned tasks and structural validation of a
//! plan's dependency graph (Kahn's algorithm).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::plan::Plan;
use crate::models::task::PlannedTask;

/// Order tasks so every task follows its dependencies; among tasks that are
/// ready at the same time, higher priority goes first and ties keep the
/// incoming order. Tasks caught in a cycle keep their relative order at the
/// end. Assigns `execution_order`.
pub fn order_tasks(tasks: Vec<PlannedTask>) -> Vec<PlannedTask> {
    let ids: HashSet<String> = tasks.iter().map(|t| t.id.clone()).collect();
    let mut in_degree: Vec<usize> = tasks
        .iter()
        .map(|t| {
            t.dependencies
                .iter()
                .filter(|d| ids.contains(&d.task_id) && d.task_id != t.id)
                .count()
        })
        .collect();
    let mut emitted = vec![false; tasks.len()];
    let mut sequence: Vec<usize> = Vec::with_capacity(tasks.len());

    while sequence.len() < tasks.len() {
        let next = (0..tasks.len())
            .filter(|&i| !emitted[i] && in_degree[i] == 0)
            .max_by(|&a, &b| tasks[a].priority.cmp(&tasks[b].priority).then(b.cmp(&a)));
        let Some(next) = next else {
            break;
        };
        emitted[next] = true;
        sequence.push(next);

        let id = tasks[next].id.as_str();
        for (i, task) in tasks.iter().enumerate() {
            if !emitted[i] {
                let edges = task.dependencies.iter().filter(|d| d.task_id == id).count();
                in_degree[i] = in_degree[i].saturating_sub(edges);
            }
        }
    }

    // cycle members
    sequence.extend((0..tasks.len()).filter(|&i| !emitted[i]));

    let mut slots: Vec<Option<PlannedTask>> = tasks.into_iter().map(Some).collect();
    sequence
        .into_iter()
        .enumerate()
        .filter_map(|(order, i)| {
            slots[i].take().map(|mut task| {
                task.execution_order = order;
                task
            })
        })
        .collect()
}

/// Structural report on a plan's dependency graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanValidation {
    /// `(task id, missing upstream id)` pairs
    pub dangling: Vec<(String, String)>,
    /// Tasks that never become ready because of a cycle
    pub cyclic: Vec<String>,
    /// Kahn layers: tasks in one layer only depend on earlier layers
    pub layers: Vec<Vec<String>>,
    pub duplicate_ids: Vec<String>,
}

impl PlanValidation {
    pub fn is_valid(&self) -> bool {
        self.dangling.is_empty() && self.cyclic.is_empty() && self.duplicate_ids.is_empty()
    }
}

/// Inspect a plan's dependency graph without mutating it.
pub fn validate_plan(plan: &Plan) -> PlanValidation {
    let mut report = PlanValidation::default();

    let mut seen: HashSet<&str> = HashSet::new();
    for task in &plan.tasks {
        if !seen.insert(task.id.as_str()) {
            report.duplicate_ids.push(task.id.clone());
        }
    }

    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for task in &plan.tasks {
        in_degree.entry(task.id.as_str()).or_insert(0);
        for dep in &task.dependencies {
            if !seen.contains(dep.task_id.as_str()) {
                report.dangling.push((task.id.clone(), dep.task_id.clone()));
                continue;
            }
            *in_degree.entry(task.id.as_str()).or_insert(0) += 1;
            dependents
                .entry(dep.task_id.as_str())
                .or_default()
                .push(task.id.as_str());
        }
    }

    // keep plan order inside each layer
    let mut remaining: Vec<&str> = Vec::new();
    for task in &plan.tasks {
        if !remaining.contains(&task.id.as_str()) {
            remaining.push(task.id.as_str());
        }
    }

    loop {
        let ready: Vec<&str> = remaining
            .iter()
            .filter(|id| in_degree.get(*id).copied().unwrap_or(0) == 0)
            .copied()
            .collect();
        if ready.is_empty() {
            break;
        }

        remaining.retain(|id| !ready.contains(id));
        for id in &ready {
            if let Some(deps) = dependents.get(id) {
                for dep in deps {
                    if let Some(degree) = in_degree.get_mut(dep) {
                        *degree = degree.saturating_sub(1);
                    }
                }
            }
        }
        report.layers.push(ready.iter().map(|id| id.to_string()).collect());
    }

    if !remaining.is_empty() {
        tracing::warn!(
            "[Graph] Plan {} has circular dependencies among {:?}",
            plan.id,
            remaining
        );
        report.cyclic = remaining.iter().map(|id| id.to_string()).collect();
    }

    report
}
