//! Template Registry & Task Catalogue
//!
//! Both are explicitly constructed, caller-owned values handed to the
//! planner and runner. There is no process-wide registry.

use std::collections::HashMap;

use super::builtin;
use super::extraction::ExtractionRules;
use super::types::{TaskDefinition, TaskTemplate, TemplateKind};
use crate::models::task::{TaskCategory, TaskType};

/// Registry of planning templates, keyed by template id, together with the
/// extraction rules their parameters refer to.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, TaskTemplate>,
    /// Registration order, for deterministic listing
    order: Vec<String>,
    rules: ExtractionRules,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in text and action template and every
    /// built-in extraction rule.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.rules = ExtractionRules::with_builtins();
        for template in builtin::text_templates()
            .into_iter()
            .chain(builtin::action_templates())
        {
            registry.register(template);
        }
        registry
    }

    /// Register a template. Re-registering an id replaces the template in
    /// place and keeps its listing position.
    pub fn register(&mut self, template: TaskTemplate) {
        if !self.templates.contains_key(&template.id) {
            self.order.push(template.id.clone());
        }
        self.templates.insert(template.id.clone(), template);
    }

    pub fn get(&self, id: &str) -> Option<&TaskTemplate> {
        self.templates.get(id)
    }

    pub fn rules(&self) -> &ExtractionRules {
        &self.rules
    }

    /// Mutable access for registering or swapping extraction rules.
    pub fn rules_mut(&mut self) -> &mut ExtractionRules {
        &mut self.rules
    }

    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    /// All templates in registration order.
    pub fn list(&self) -> Vec<&TaskTemplate> {
        self.order
            .iter()
            .filter_map(|id| self.templates.get(id))
            .collect()
    }

    pub fn list_by_kind(&self, kind: TemplateKind) -> Vec<&TaskTemplate> {
        self.list().into_iter().filter(|t| t.kind == kind).collect()
    }

    pub fn text_templates(&self) -> Vec<&TaskTemplate> {
        self.list_by_kind(TemplateKind::Text)
    }

    pub fn action_templates(&self) -> Vec<&TaskTemplate> {
        self.list_by_kind(TemplateKind::Action)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Catalogue of runnable task types.
#[derive(Debug, Clone, Default)]
pub struct TaskCatalogue {
    definitions: HashMap<TaskType, TaskDefinition>,
}

impl TaskCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalogue covering every built-in task type.
    pub fn with_builtins() -> Self {
        let mut catalogue = Self::new();
        for definition in builtin::definitions() {
            catalogue.register(definition);
        }
        catalogue
    }

    pub fn register(&mut self, definition: TaskDefinition) {
        self.definitions.insert(definition.task_type.clone(), definition);
    }

    pub fn get(&self, task_type: &TaskType) -> Option<&TaskDefinition> {
        self.definitions.get(task_type)
    }

    pub fn contains(&self, task_type: &TaskType) -> bool {
        self.definitions.contains_key(task_type)
    }

    /// Category of a task type: the catalogue entry wins over the built-in
    /// classification, so custom types can be declared page actions.
    pub fn category_of(&self, task_type: &TaskType) -> TaskCategory {
        self.get(task_type)
            .map(|d| d.category)
            .unwrap_or_else(|| task_type.category())
    }

    /// Retry budget of a task type.
    pub fn max_retries_for(&self, task_type: &TaskType, text_default: u32, action_default: u32) -> u32 {
        if let Some(max) = self.get(task_type).and_then(|d| d.max_retries) {
            return max;
        }
        match self.category_of(task_type) {
            TaskCategory::Text => text_default,
            TaskCategory::PageAction => action_default,
        }
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
