//! Dependency Inference
//!
//! Links a task to the closest preceding task whose type usually feeds it
//! (summarize before translate, navigate before click, ...).

use crate::models::task::{TaskCategory, TaskDependency, PlannedTask};
use crate::services::templates::TaskCatalogue;

/// Payload field under which page-action tasks publish extracted content.
pub const EXTRACTED_FIELD: &str = "extracted";

/// Task types that typically precede `task_type_id`, by task type id.
pub fn upstream_types(task_type_id: &str) -> &'static [&'static str] {
    match task_type_id {
        "translate" => &["summarize", "rewrite", "extract_info", "extract"],
        "rewrite" => &["summarize"],
        "analyze" => &["extract_info", "extract"],
        "compose" => &["summarize", "analyze"],
        "answer" => &["extract_info", "extract"],
        "format_list" => &["summarize", "extract_info"],
        "summarize" => &["extract"],
        "type" => &["click"],
        "click" => &["navigate", "type", "wait"],
        "extract" => &["navigate", "click", "scroll", "wait"],
        "screenshot" => &["navigate", "click", "scroll"],
        "scroll" => &["navigate"],
        "wait" => &["click", "navigate"],
        _ => &[],
    }
}

/// Whether tasks of this type produce content worth handing downstream.
fn produces_content(task: &PlannedTask, catalogue: &TaskCatalogue) -> bool {
    match catalogue.category_of(&task.task_type) {
        TaskCategory::Text => true,
        TaskCategory::PageAction => task.task_type.id() == "extract",
    }
}

/// Add `on_success` dependencies in place.
///
/// Each task is linked to the nearest preceding task of an upstream type.
/// When the upstream produces content and the downstream declares an input
/// parameter, the dependency also maps the upstream payload (or its
/// extracted field, for page actions) into that parameter.
pub fn infer_dependencies(tasks: &mut [PlannedTask], catalogue: &TaskCatalogue) {
    for index in 0..tasks.len() {
        let upstream = upstream_types(tasks[index].task_type.id());
        if upstream.is_empty() {
            continue;
        }

        let Some(producer) = tasks[..index]
            .iter()
            .rev()
            .find(|t| upstream.contains(&t.task_type.id()))
        else {
            continue;
        };

        let mut dependency = TaskDependency::on_success(producer.id.clone());
        let input_param = catalogue
            .get(&tasks[index].task_type)
            .and_then(|d| d.input_param.clone());
        if let Some(param) = input_param.filter(|_| produces_content(producer, catalogue)) {
            let path = match catalogue.category_of(&producer.task_type) {
                TaskCategory::Text => "",
                TaskCategory::PageAction => EXTRACTED_FIELD,
            };
            dependency = dependency.map(param, path);
        }

        tracing::debug!(
            "[Dependencies] {} depends on {}",
            tasks[index].id,
            dependency.task_id
        );
        tasks[index].dependencies.push(dependency);
    }
}
