//! Decomposition & Planning
//!
//! `decompose` turns a free-text instruction into ordered, parameterized
//! tasks; `Planner` wraps the result into a ready-to-run `Plan`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use task_cascade_core::PageSnapshot;

use super::dependencies::infer_dependencies;
use super::graph::order_tasks;
use super::parameters::{clause_for, resolve_parameters};
use super::scoring::{match_templates, TemplateMatch};
use crate::models::plan::Plan;
use crate::models::settings::EngineSettings;
use crate::models::task::{PlannedTask, TaskType};
use crate::services::templates::{ExtractionContext, TaskCatalogue, TemplateRegistry};
use crate::utils::error::{AppError, AppResult};

/// Longest goal string derived from an instruction, in characters.
const GOAL_MAX_CHARS: usize = 80;

/// Caller-imposed limits on a decomposition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecompositionConstraints {
    /// Keep at most this many tasks (highest priority first)
    #[serde(default)]
    pub max_tasks: Option<usize>,
    /// Task types that must not be planned
    #[serde(default)]
    pub excluded_types: Vec<TaskType>,
    /// Mark every task non-parallelizable
    #[serde(default)]
    pub disable_parallel: bool,
}

impl DecompositionConstraints {
    pub fn with_max_tasks(mut self, max_tasks: usize) -> Self {
        self.max_tasks = Some(max_tasks);
        self
    }

    pub fn exclude(mut self, task_type: TaskType) -> Self {
        self.excluded_types.push(task_type);
        self
    }

    pub fn sequential_only(mut self) -> Self {
        self.disable_parallel = true;
        self
    }
}

/// Apply exclusions and the task cap to the matched templates. The cap
/// keeps the highest-priority matches and preserves mention order.
fn constrain<'a>(
    mut matches: Vec<TemplateMatch<'a>>,
    catalogue: &TaskCatalogue,
    constraints: &DecompositionConstraints,
) -> Vec<TemplateMatch<'a>> {
    matches.retain(|m| {
        let task_type = &m.template.task_type;
        if !catalogue.contains(task_type) {
            tracing::debug!(
                "[Decompose] Skipping template '{}': no definition for {}",
                m.template.id,
                task_type
            );
            return false;
        }
        !constraints.excluded_types.contains(task_type)
    });

    if let Some(max) = constraints.max_tasks {
        if matches.len() > max {
            let mut ranked: Vec<usize> = (0..matches.len()).collect();
            ranked.sort_by(|&a, &b| {
                matches[b]
                    .template
                    .priority
                    .cmp(&matches[a].template.priority)
                    .then(a.cmp(&b))
            });
            ranked.truncate(max);
            ranked.sort_unstable();
            let mut slots: Vec<Option<TemplateMatch<'a>>> = matches.into_iter().map(Some).collect();
            matches = ranked.into_iter().filter_map(|i| slots[i].take()).collect();
        }
    }

    matches
}

/// Decompose an instruction into ordered tasks.
///
/// Task ids are `{template id}-{n}`, where `n` is the 1-based position of
/// the match in the instruction across all templates.
/// An instruction no template matches yields an empty list. Templates whose
/// task type is missing from the catalogue are skipped.
pub fn decompose(
    instruction: &str,
    templates: &TemplateRegistry,
    catalogue: &TaskCatalogue,
    snapshot: Option<&PageSnapshot>,
    constraints: Option<&DecompositionConstraints>,
) -> Vec<PlannedTask> {
    let default_constraints = DecompositionConstraints::default();
    let constraints = constraints.unwrap_or(&default_constraints);

    let matches = constrain(match_templates(instruction, templates), catalogue, constraints);
    if matches.is_empty() {
        tracing::info!("[Decompose] No template matched instruction");
        return Vec::new();
    }

    let mut tasks: Vec<PlannedTask> = matches
        .iter()
        .enumerate()
        .map(|(index, matched)| {
            let template = matched.template;
            let clause = clause_for(instruction, template);
            let ctx = ExtractionContext::new(instruction)
                .with_clause(clause)
                .with_snapshot(snapshot);

            let mut task = PlannedTask::new(
                format!("{}-{}", template.id, index + 1),
                template.name.clone(),
                template.task_type.clone(),
            )
            .with_priority(template.priority)
            .with_parallelizable(template.parallelizable && !constraints.disable_parallel)
            .with_max_retries(catalogue.max_retries_for(&template.task_type, 3, 2));
            task.parameters = resolve_parameters(template, &ctx, templates.rules());
            task.estimated_duration_ms = template.estimated_duration_ms;
            task.tags = template.tags.clone();
            task.metadata = BTreeMap::from([
                ("templateId".to_string(), json!(template.id)),
                ("score".to_string(), json!(matched.score)),
                ("clause".to_string(), json!(clause)),
            ]);
            task
        })
        .collect();

    infer_dependencies(&mut tasks, catalogue);
    let tasks = order_tasks(tasks);

    tracing::info!(
        "[Decompose] {} tasks: {:?}",
        tasks.len(),
        tasks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>()
    );
    tasks
}

/// Short goal statement: the first sentence, capped at `GOAL_MAX_CHARS`.
pub fn derive_goal(instruction: &str) -> String {
    let trimmed = instruction.trim();
    let first = trimmed
        .split_terminator(['.', '!', '?', '\n', '。', '！', '？'])
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(trimmed);

    if first.chars().count() <= GOAL_MAX_CHARS {
        first.to_string()
    } else {
        let cut: String = first.chars().take(GOAL_MAX_CHARS - 3).collect();
        format!("{}...", cut.trim_end())
    }
}

/// Builds plans from instructions.
#[derive(Debug, Clone)]
pub struct Planner {
    templates: Arc<TemplateRegistry>,
    catalogue: Arc<TaskCatalogue>,
    settings: EngineSettings,
}

impl Planner {
    pub fn new(templates: Arc<TemplateRegistry>, catalogue: Arc<TaskCatalogue>, settings: EngineSettings) -> Self {
        Self {
            templates,
            catalogue,
            settings,
        }
    }

    /// Planner over the built-in templates and catalogue.
    pub fn with_builtins(settings: EngineSettings) -> Self {
        Self::new(
            Arc::new(TemplateRegistry::with_builtins()),
            Arc::new(TaskCatalogue::with_builtins()),
            settings,
        )
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn catalogue(&self) -> Arc<TaskCatalogue> {
        Arc::clone(&self.catalogue)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Decompose an instruction into a `ready` plan.
    ///
    /// The settings' task cap applies unless the constraints set a tighter
    /// one. An empty instruction is a planning error; an instruction that
    /// matches nothing yields an empty plan.
    pub fn create_plan(
        &self,
        instruction: &str,
        snapshot: Option<&PageSnapshot>,
        constraints: Option<&DecompositionConstraints>,
    ) -> AppResult<Plan> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(AppError::planning("instruction is empty"));
        }

        let mut constraints = constraints.cloned().unwrap_or_default();
        let cap = constraints
            .max_tasks
            .map_or(self.settings.max_tasks, |m| m.min(self.settings.max_tasks));
        constraints.max_tasks = Some(cap);

        let mut tasks = decompose(
            instruction,
            &self.templates,
            &self.catalogue,
            snapshot,
            Some(&constraints),
        );
        for task in &mut tasks {
            task.max_retries = self.catalogue.max_retries_for(
                &task.task_type,
                self.settings.text_max_retries,
                self.settings.action_max_retries,
            );
        }

        let mut plan = Plan::new(instruction, derive_goal(instruction), tasks)
            .with_config(self.settings.plan_config())
            .with_snapshot(snapshot.cloned());
        plan.recompute_estimates();
        plan.mark_ready();

        tracing::info!(
            "[Planner] Created plan {} with {} tasks (~{}ms, ~{}ms parallel)",
            plan.id,
            plan.tasks.len(),
            plan.estimated_duration_ms,
            plan.estimated_parallel_duration_ms
        );
        Ok(plan)
    }
}
