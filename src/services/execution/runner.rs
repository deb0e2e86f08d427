//! Task Runner
//!
//! Executes one attempt of one task and normalizes whatever happens into a
//! `TaskResult`. The runner never panics on collaborator failures and never
//! retries; retry policy belongs to the engine.

use std::borrow::Cow;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use regex::{Captures, Regex};
use serde_json::{json, Value};
use task_cascade_core::{
    validate_params, ActionKind, CoreError, PageActionExecutor, PageSnapshot, Params, SnapshotProvider,
    TextCapability,
};

use super::actions::synthesize_actions;
use super::context::ExecutionContext;
use crate::models::task::{PlannedTask, TaskCategory, TaskErrorKind, TaskResult};
use crate::services::decomposition::EXTRACTED_FIELD;
use crate::services::templates::{TaskCatalogue, TaskDefinition};

fn placeholder_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z_][\w.]*)\s*\}\}").ok())
        .as_ref()
}

/// Fill `{{name}}` placeholders from the parameters, then from page context
/// (`selected_text`, `source_url`, `page_title`, `timestamp`). Unknown
/// placeholders render empty.
pub fn render_prompt(template: &str, params: &Params, snapshot: Option<&PageSnapshot>) -> String {
    let Some(re) = placeholder_pattern() else {
        return template.to_string();
    };
    re.replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        if let Some(value) = params.get(name) {
            return value.render();
        }
        match (name, snapshot) {
            ("selected_text", Some(s)) => s.selected_text.clone(),
            ("source_url", Some(s)) => s.url.clone(),
            ("page_title", Some(s)) => s.title.clone(),
            ("timestamp", _) => chrono::Utc::now().to_rfc3339(),
            _ => String::new(),
        }
    })
    .into_owned()
}

fn error_kind(err: &CoreError) -> TaskErrorKind {
    match err {
        CoreError::Validation(_) => TaskErrorKind::Validation,
        CoreError::Capability(_) => TaskErrorKind::Capability,
        _ => TaskErrorKind::Internal,
    }
}

/// Runs single task attempts against the configured collaborators.
pub struct TaskRunner {
    catalogue: Arc<TaskCatalogue>,
    text: Arc<dyn TextCapability>,
    pages: Option<Arc<dyn PageActionExecutor>>,
    snapshots: Option<Arc<dyn SnapshotProvider>>,
    resnapshot: bool,
}

impl TaskRunner {
    pub fn new(catalogue: Arc<TaskCatalogue>, text: Arc<dyn TextCapability>) -> Self {
        Self {
            catalogue,
            text,
            pages: None,
            snapshots: None,
            resnapshot: false,
        }
    }

    pub fn with_page_executor(mut self, pages: Arc<dyn PageActionExecutor>) -> Self {
        self.pages = Some(pages);
        self
    }

    pub fn with_snapshot_provider(mut self, snapshots: Arc<dyn SnapshotProvider>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// Re-capture the page before grounding each page-action task.
    pub fn resnapshot_before_actions(mut self, enabled: bool) -> Self {
        self.resnapshot = enabled;
        self
    }

    pub fn catalogue(&self) -> &TaskCatalogue {
        &self.catalogue
    }

    /// Execute one attempt of `task`.
    pub async fn run(&self, task: &PlannedTask, ctx: &ExecutionContext) -> TaskResult {
        let started = Instant::now();
        let elapsed = || started.elapsed().as_millis() as u64;

        let Some(definition) = self.catalogue.get(&task.task_type) else {
            return TaskResult::failed(
                TaskErrorKind::Validation,
                format!("unknown task type '{}'", task.task_type),
                elapsed(),
            );
        };

        let params = match self.prepare_params(definition, task, ctx) {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!("[TaskRunner] {} rejected: {}", task.id, e);
                return TaskResult::failed(TaskErrorKind::Validation, e.to_string(), elapsed());
            }
        };

        let outcome = match definition.category {
            TaskCategory::Text => self.run_text(definition, &params, ctx).await,
            TaskCategory::PageAction => self.run_actions(task, &params, ctx).await,
        };

        match outcome {
            Ok(data) => TaskResult::ok(data, elapsed()),
            Err((kind, error, data)) => {
                let result = TaskResult::failed(kind, error, elapsed());
                match data {
                    Some(data) => result.with_data(data),
                    None => result,
                }
            }
        }
    }

    /// Effective parameters, coerced to the declared kinds and validated.
    fn prepare_params(
        &self,
        definition: &TaskDefinition,
        task: &PlannedTask,
        ctx: &ExecutionContext,
    ) -> Result<Params, CoreError> {
        let mut params = ctx.effective_params(task);
        for spec in &definition.parameters {
            if let Some(value) = params.remove(&spec.name) {
                params.insert(spec.name.clone(), value.coerce_to(spec.kind));
            }
        }
        validate_params(&definition.parameters, &mut params)?;
        Ok(params)
    }

    async fn run_text(
        &self,
        definition: &TaskDefinition,
        params: &Params,
        ctx: &ExecutionContext,
    ) -> Result<Value, (TaskErrorKind, String, Option<Value>)> {
        let template = definition.prompt.as_deref().map(Cow::Borrowed).unwrap_or_else(|| {
            // no template: hand the input parameter through verbatim
            Cow::Owned(format!("{{{{{}}}}}", definition.input_param.as_deref().unwrap_or("text")))
        });
        let prompt = render_prompt(&template, params, ctx.snapshot.as_ref());

        match self.text.invoke(&prompt).await {
            Ok(response) if response.success => Ok(response.payload),
            Ok(response) => Err((
                TaskErrorKind::Capability,
                response
                    .error
                    .unwrap_or_else(|| "text capability reported failure".to_string()),
                None,
            )),
            Err(e) => Err((error_kind(&e), e.to_string(), None)),
        }
    }

    async fn run_actions(
        &self,
        task: &PlannedTask,
        params: &Params,
        ctx: &ExecutionContext,
    ) -> Result<Value, (TaskErrorKind, String, Option<Value>)> {
        let Some(pages) = &self.pages else {
            return Err((
                TaskErrorKind::Validation,
                "no page-action executor configured".to_string(),
                None,
            ));
        };

        let (snapshot, fresh) = self.current_snapshot(ctx).await;
        let actions = match &task.actions {
            Some(actions) => actions.clone(),
            None => synthesize_actions(&task.task_type, params, snapshot.as_ref(), !fresh)
                .map_err(|e| (TaskErrorKind::Validation, e, None))?,
        };

        let mut records = Vec::with_capacity(actions.len());
        let mut extracted: Option<Value> = None;
        let mut first_error: Option<String> = None;

        for (index, action) in actions.iter().enumerate() {
            let outcome = pages.perform(action).await;
            if outcome.success {
                if action.kind == ActionKind::Extract {
                    extracted = outcome.result.clone();
                }
            } else if first_error.is_none() {
                first_error = Some(format!(
                    "action {} of {} ({} at {}) failed: {}",
                    index + 1,
                    actions.len(),
                    action.kind,
                    action.locator.as_deref().unwrap_or("-"),
                    outcome.error.as_deref().unwrap_or("unknown error")
                ));
            }
            records.push(json!({
                "kind": action.kind,
                "locator": action.locator,
                "value": action.value,
                "success": outcome.success,
                "result": outcome.result,
                "error": outcome.error,
            }));
        }

        let mut data = json!({ "actions": records });
        if let Some(extracted) = extracted {
            data[EXTRACTED_FIELD] = extracted;
        }

        match first_error {
            None => Ok(data),
            Some(error) => Err((TaskErrorKind::Grounding, error, Some(data))),
        }
    }

    /// The snapshot to ground against and whether it was captured just now.
    async fn current_snapshot(&self, ctx: &ExecutionContext) -> (Option<PageSnapshot>, bool) {
        if self.resnapshot {
            if let Some(provider) = &self.snapshots {
                match provider.snapshot().await {
                    Ok(snapshot) => return (Some(snapshot), true),
                    Err(e) => {
                        tracing::warn!(
                            "[TaskRunner] Re-capturing the page failed, grounding against the plan snapshot: {}",
                            e
                        );
                    }
                }
            }
        }
        (ctx.snapshot.clone(), false)
    }
}
